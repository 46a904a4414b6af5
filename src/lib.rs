//! # lib-solver
//!
//! Locates, version-checks and downloads the native libraries (`ngs-sdk`,
//! `ncbi-vdb`) that an NGS/VDB client has to load before it can read any data.
//!
//! A library may be installed in several places at once, in several versions,
//! or not at all. `lib-solver` searches a fixed list of locations in priority
//! order, checks the version each candidate reports against a minimum, falls
//! back to downloading a build for the current OS and architecture, and
//! remembers the outcome so the next run starts from the right file.
//!
//! ## Features
//!
//! - **Ordered search**: cache, installation home, loader path, application
//!   directory, class path, working directory, temp directory, download
//! - **Version gate**: copies older than the required version are rejected
//!   and reported together
//! - **Latest search**: optionally keeps scanning and loads the newest copy
//! - **Auto-download**: fetches the library from NCBI with OS/architecture
//!   negotiation, keeping a `.bak` of any copy it replaces
//! - **Persistent cache**: `LibManager.properties` in the installation home
//! - **Isolated probing**: libraries can be checked in a child process
//!
//! ## Example
//!
//! ```rust,no_run
//! use lib_solver::{LibraryResolver, ResolverConfig};
//!
//! let mut resolver = LibraryResolver::from_env(ResolverConfig::from_env()).unwrap();
//! match resolver.load_library("ncbi-vdb") {
//!     Ok(lib) => println!("{} {} at {}", lib.libname, lib.version, lib.path.display()),
//!     Err(e) => eprintln!("{e}: {}", e.recommendation().unwrap_or_default()),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Versions, platform detection and search locations
//! - [`cache`]: The persistent library cache
//! - [`search`]: Candidate discovery and download file creation
//! - [`remote`]: The download service client
//! - [`resolver`]: Version probes and the resolution protocol
//! - [`cli`]: Command-line interface implementation

pub mod cache;
pub mod cli;
pub mod core;
pub mod remote;
pub mod resolver;
pub mod search;

// Re-export commonly used types for convenience
pub use crate::cache::store::LibraryCache;
pub use crate::core::types::*;
pub use crate::core::version::Version;
pub use crate::resolver::config::{LibrarySpec, ResolverConfig};
pub use crate::resolver::engine::{LibraryResolver, ResolvedLibrary};
pub use crate::resolver::error::{LibraryLoadError, LoadCause};
