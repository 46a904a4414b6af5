use clap::Args;

use crate::cli::{library_pairs, minimum_for, OutputFormat, ResolverArgs};
use crate::resolver::config::LibrarySpec;
use crate::resolver::engine::ResolvedLibrary;
use crate::resolver::probe::ProbeMarker;

#[derive(Args)]
pub struct ResolveArgs {
    /// Libraries to resolve, each optionally followed by its minimum version
    /// (e.g. "ngs-sdk 2.10.0 ncbi-vdb")
    #[arg(required = true, value_name = "LIB [MIN]")]
    pub libraries: Vec<String>,
}

/// Execute the resolve command
///
/// # Errors
///
/// Returns an error if the resolver cannot be created or any library could
/// not be resolved.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(
    args: ResolveArgs,
    resolver_args: &ResolverArgs,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut resolver = resolver_args.resolver()?;
    let pairs = library_pairs(&args.libraries);

    let mut resolved: Vec<ResolvedLibrary> = Vec::new();
    let mut failed = 0;

    for (libname, min) in &pairs {
        let spec = LibrarySpec::new(
            libname.as_str(),
            minimum_for(resolver.config(), libname, min.as_deref()),
        );
        match resolver.resolve(&spec) {
            Ok(found) => resolved.push(found),
            Err(e) => {
                failed += 1;
                eprintln!("{e}");
                if let Some(recommendation) = e.recommendation() {
                    eprintln!("{recommendation}");
                }
            }
        }
    }

    match format {
        OutputFormat::Text => print_text(&resolved, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} libraries could not be resolved", pairs.len());
    }
    Ok(())
}

/// One marker line per library, the format child processes are parsed from
pub(crate) fn print_text(libraries: &[ResolvedLibrary], verbose: bool) {
    for lib in libraries {
        let marker = ProbeMarker {
            libname: lib.libname.clone(),
            filename: lib.path.display().to_string(),
            version: None,
        };
        println!("{marker}");
        if verbose {
            eprintln!("  version {} from {}", lib.version, lib.location);
        }
    }
}
