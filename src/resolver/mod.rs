//! Library resolution.
//!
//! [`LibraryResolver`](engine::LibraryResolver) walks the configured
//! locations, asks a [`VersionProbe`](probe::VersionProbe) for the version of
//! every candidate, downloads the library when nothing local qualifies, and
//! records the outcome in the cache.

pub mod config;
pub mod engine;
pub mod error;
pub mod probe;
