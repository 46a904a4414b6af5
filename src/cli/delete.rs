use clap::Args;

use crate::cli::{OutputFormat, ResolverArgs};

#[derive(Args)]
pub struct DeleteArgs {
    /// Libraries whose downloaded copies are removed
    #[arg(required = true)]
    pub libraries: Vec<String>,
}

/// Execute the delete command
///
/// # Errors
///
/// Returns an error if the resolver cannot be created.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: DeleteArgs, resolver_args: &ResolverArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut resolver = resolver_args.resolver()?;

    let removed: Vec<(String, usize)> = args
        .libraries
        .iter()
        .map(|libname| (libname.clone(), resolver.delete_libraries(libname)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (libname, count) in &removed {
                println!("{libname}: removed {count} file(s)");
            }
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = removed
                .into_iter()
                .map(|(libname, count)| (libname, serde_json::Value::from(count)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
    }
    Ok(())
}
