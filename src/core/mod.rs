//! Core data types for library resolution.
//!
//! - [`Version`](version::Version): dotted version strings with a total order
//! - [`Platform`](platform::Platform), [`Bits`](platform::Bits): what the
//!   download service needs to pick a build, and how library files are named
//! - [`Location`](types::Location): the search locations in priority order
//!
//! ## Library file names
//!
//! | OS      | `ngs-sdk`, 64-bit                                  |
//! |---------|----------------------------------------------------|
//! | Linux   | libngs-sdk-64.so, libngs-sdk.so                    |
//! | macOS   | libngs-sdk-64.dylib, libngs-sdk.dylib, ngs-sdk-64.dylib, ngs-sdk.dylib |
//! | Windows | ngs-sdk-64.dll, ngs-sdk.dll                        |

pub mod platform;
pub mod types;
pub mod version;
