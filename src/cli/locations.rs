use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{OutputFormat, ResolverArgs};
use crate::core::types::Location;
use crate::search::context::SearchContext;

#[derive(Serialize)]
struct LocationInfo {
    location: Location,
    code: char,
    directories: Vec<PathBuf>,
}

/// Execute the locations command
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn run(resolver_args: &ResolverArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = resolver_args.config()?;
    let context = SearchContext::from_env(&config);

    let infos: Vec<LocationInfo> = config
        .effective_locations()
        .into_iter()
        .map(|location| LocationInfo {
            location,
            code: location.code(),
            directories: context.directories(location),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            if verbose {
                eprintln!("Platform: {:?}", context.platform);
            }
            for info in &infos {
                println!("{} {}", info.code, info.location);
                for dir in &info.directories {
                    let marker = if dir.is_dir() { "" } else { " (missing)" };
                    println!("    {}{marker}", dir.display());
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&infos)?),
    }

    Ok(())
}
