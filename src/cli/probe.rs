use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::resolver::probe::{NativeProbe, ProbeMarker, VersionProbe};

#[derive(Args)]
pub struct ProbeArgs {
    /// Library name (e.g. "ngs-sdk")
    #[arg(required = true)]
    pub libname: String,

    /// Library file to load
    #[arg(required = true)]
    pub path: PathBuf,
}

#[derive(Serialize)]
struct ProbeOutput {
    libname: String,
    path: PathBuf,
    version: String,
}

/// Execute the probe command.
///
/// Always probes in-process: this is the child side of `--subprocess-probe`.
///
/// # Errors
///
/// Returns an error if the library cannot be loaded or reports no usable
/// version.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ProbeArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let probe = NativeProbe::new();
    let version = probe.probe(&args.libname, &args.path)?;

    if verbose {
        eprintln!("Loaded {} from {}", args.libname, args.path.display());
    }

    match format {
        OutputFormat::Text => {
            let marker = ProbeMarker {
                libname: args.libname,
                filename: args.path.display().to_string(),
                version: Some(version.to_string()),
            };
            println!("{marker}");
        }
        OutputFormat::Json => {
            let output = ProbeOutput {
                libname: args.libname,
                path: args.path,
                version: version.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
