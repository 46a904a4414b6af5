use clap::Args;

use crate::cli::{library_pairs, resolve, OutputFormat, ResolverArgs};
use crate::resolver::engine::ResolvedLibrary;

#[derive(Args)]
pub struct CheckArgs {
    /// Libraries to check, each optionally followed by the latest version to
    /// compare with instead of asking the download service
    #[arg(required = true, value_name = "LIB [LATEST]")]
    pub libraries: Vec<String>,
}

/// Execute the check command
///
/// # Errors
///
/// Returns an error if the resolver cannot be created or a library is
/// available neither locally nor for download.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(
    args: CheckArgs,
    resolver_args: &ResolverArgs,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut resolver = resolver_args.resolver()?;
    let pairs = library_pairs(&args.libraries);

    let mut found: Vec<ResolvedLibrary> = Vec::new();
    let mut missing: Vec<&str> = Vec::new();

    for (libname, latest) in &pairs {
        match resolver.check_library(libname, latest.as_deref()) {
            Some(lib) => found.push(lib),
            None => {
                eprintln!("Cannot find {libname} library");
                missing.push(libname);
            }
        }
    }

    match format {
        OutputFormat::Text => resolve::print_text(&found, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
    }

    if !missing.is_empty() {
        anyhow::bail!("Unavailable libraries: {}", missing.join(", "));
    }
    Ok(())
}
