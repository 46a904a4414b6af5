use clap::{Args, Subcommand};

use crate::cache::store::{LibraryRecord, SlotRecord};
use crate::cli::{OutputFormat, ResolverArgs};

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show every cached library
    Show,

    /// Forget cached libraries (all of them when no name is given)
    Clear {
        /// Library names
        libraries: Vec<String>,
    },
}

/// Execute cache subcommands
///
/// # Errors
///
/// Returns an error if the cache location cannot be determined or the
/// records cannot be serialized.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(
    args: CacheArgs,
    resolver_args: &ResolverArgs,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut cache = resolver_args.cache()?;

    match args.command {
        CacheCommands::Show => {
            let records = cache.records();
            match format {
                OutputFormat::Text => {
                    if verbose {
                        if let Some(path) = cache.path() {
                            eprintln!("Cache file: {}", path.display());
                        }
                    }
                    print_records(&records);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            }
        }
        CacheCommands::Clear { libraries } => {
            let targets = if libraries.is_empty() {
                cache.libraries()
            } else {
                libraries
            };
            for libname in &targets {
                cache.forget(libname);
            }
            if cache.is_dirty() && !cache.store() {
                anyhow::bail!("Cannot write the library cache");
            }
            println!("Cleared {} cache record(s)", targets.len());
        }
    }

    Ok(())
}

fn print_records(records: &[LibraryRecord]) {
    if records.is_empty() {
        println!("No cached libraries.");
        return;
    }

    for record in records {
        println!("{} ({}-bit)", record.libname, record.bits);
        print_slot("loaded", &record.loaded);
        print_slot("saved", &record.saved);
        if let Some(at) = &record.last_search {
            println!("  last search: {at}");
        }
    }
}

fn print_slot(name: &str, slot: &SlotRecord) {
    match (&slot.path, &slot.version) {
        (None, None) => {}
        (path, version) => println!(
            "  {name}: {} ({})",
            path.as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            version
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        ),
    }
}
