use clap::Parser;
use tracing_subscriber::EnvFilter;

use lib_solver::cli;
use lib_solver::resolver::config::ENV_LOG;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // VDB_LOG wins over the verbosity flag
    let filter = std::env::var(ENV_LOG)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            if cli.verbose {
                EnvFilter::new("lib_solver=debug,info")
            } else {
                EnvFilter::new("lib_solver=warn")
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Resolve(args) => {
            cli::resolve::run(args, &cli.resolver, cli.format, cli.verbose)?;
        }
        cli::Commands::Check(args) => {
            cli::check::run(args, &cli.resolver, cli.format, cli.verbose)?;
        }
        cli::Commands::Probe(args) => {
            cli::probe::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Cache(args) => {
            cli::cache::run(args, &cli.resolver, cli.format, cli.verbose)?;
        }
        cli::Commands::Locations => {
            cli::locations::run(&cli.resolver, cli.format, cli.verbose)?;
        }
        cli::Commands::Delete(args) => {
            cli::delete::run(args, &cli.resolver, cli.format)?;
        }
    }

    Ok(())
}
