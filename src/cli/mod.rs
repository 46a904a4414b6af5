//! Command-line interface for lib-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **resolve**: Find (and if needed download) libraries and print where they are
//! - **check**: Compare local libraries with the latest release and update them
//! - **probe**: Report the version of one library file (used as a child process)
//! - **cache**: Show or clear the library cache
//! - **locations**: Show where libraries are searched for
//! - **delete**: Remove downloaded libraries
//!
//! ## Usage
//!
//! ```text
//! # Resolve both native libraries at their default minimum versions
//! lib-solver resolve ngs-sdk ncbi-vdb
//!
//! # Require a specific version, never touch the network
//! lib-solver --no-download resolve ngs-sdk 2.10.0
//!
//! # Only look in the cache and the current directory
//! lib-solver --locations KW resolve ncbi-vdb
//!
//! # Inspect the cache as JSON
//! lib-solver cache show --format json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::cache::store::LibraryCache;
use crate::core::platform::Bits;
use crate::core::types::Location;
use crate::core::version::Version;
use crate::resolver::config::ResolverConfig;
use crate::resolver::engine::LibraryResolver;
use crate::resolver::probe::SubprocessProbe;

pub mod cache;
pub mod check;
pub mod delete;
pub mod locations;
pub mod probe;
pub mod resolve;

#[derive(Parser)]
#[command(name = "lib-solver")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Locate, version-check and download the ngs-sdk and ncbi-vdb native libraries")]
#[command(
    long_about = "lib-solver finds the native libraries an NGS/VDB client must load before it can read any data.\n\nIt searches a fixed list of locations in priority order:\n- the library cache (K), the installation home (N), the loader path (L)\n- the application directory (J), the class path (C), the working directory (W), the temp directory (T)\n- and finally downloads the library from NCBI (D)\n\nThe outcome is remembered in LibManager.properties under the installation home."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub resolver: ResolverArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve libraries and print their paths
    Resolve(resolve::ResolveArgs),

    /// Update libraries when a newer release is available
    Check(check::CheckArgs),

    /// Print the version of a single library file
    Probe(probe::ProbeArgs),

    /// Inspect or clear the library cache
    Cache(cache::CacheArgs),

    /// Show the effective search locations
    Locations,

    /// Remove downloaded libraries
    Delete(delete::DeleteArgs),
}

/// Flags shared by every command that searches for libraries.
///
/// Each flag is ORed with the matching `VDB_*` environment variable.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ResolverArgs {
    /// Only do a plain system load from the loader path
    #[arg(long, global = true)]
    pub system_load: bool,

    /// Never download libraries
    #[arg(long, global = true)]
    pub no_download: bool,

    /// Stop at the first acceptable library instead of the newest one
    #[arg(long, global = true)]
    pub no_latest_search: bool,

    /// Locations to search, as codes in priority order (e.g. "KNLD")
    #[arg(long, global = true, value_name = "CODES")]
    pub locations: Option<String>,

    /// Installation home holding the cache and downloaded libraries
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Check each library in a child process
    #[arg(long, global = true)]
    pub subprocess_probe: bool,
}

impl ResolverArgs {
    /// The environment configuration with the command-line flags applied
    ///
    /// # Errors
    ///
    /// Returns an error if `--locations` contains no known location code.
    pub fn config(&self) -> anyhow::Result<ResolverConfig> {
        let mut config = ResolverConfig::from_env();
        if self.system_load {
            config = config.with_system_load_only(true);
        }
        if self.no_download {
            config = config.with_download(false);
        }
        if self.no_latest_search {
            config = config.with_search_latest(false);
        }
        if let Some(codes) = &self.locations {
            let locations = Location::parse_codes(codes)
                .with_context(|| format!("No known location code in '{codes}'"))?;
            config = config.with_locations(locations);
        }
        if let Some(home) = &self.home {
            config = config.with_install_home(home);
        }
        Ok(config)
    }

    /// A resolver for this process
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn resolver(&self) -> anyhow::Result<LibraryResolver> {
        let resolver = LibraryResolver::from_env(self.config()?)?;
        if self.subprocess_probe {
            let probe = SubprocessProbe::current_exe()
                .context("Cannot locate the current executable for --subprocess-probe")?;
            return Ok(resolver.with_probe(Box::new(probe)));
        }
        Ok(resolver)
    }

    /// The library cache of the installation home
    ///
    /// # Errors
    ///
    /// Returns an error if no installation home can be determined.
    pub fn cache(&self) -> anyhow::Result<LibraryCache> {
        let config = self.config()?;
        let home = config
            .install_home
            .context("Cannot determine the installation home; use --home")?;
        Ok(LibraryCache::open(
            LibraryCache::default_path(&home),
            Bits::detect(),
        ))
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Group `LIB [VERSION]` arguments into pairs.
///
/// A token starting with a digit is the version of the library before it;
/// library names never start with a digit.
#[must_use]
pub fn library_pairs(tokens: &[String]) -> Vec<(String, Option<String>)> {
    let mut pairs: Vec<(String, Option<String>)> = Vec::new();
    for token in tokens {
        let is_version = token.starts_with(|c: char| c.is_ascii_digit());
        match pairs.last_mut() {
            Some((_, version @ None)) if is_version => *version = Some(token.clone()),
            _ => pairs.push((token.clone(), None)),
        }
    }
    pairs
}

/// Minimum version for a library: the one given, the declared one, or any
#[must_use]
pub fn minimum_for(config: &ResolverConfig, libname: &str, given: Option<&str>) -> Version {
    given
        .map(Version::parse)
        .or_else(|| config.minimum_version(libname).cloned())
        .unwrap_or_else(|| Version::parse("0"))
}
