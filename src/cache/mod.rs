//! The persistent library cache.
//!
//! Remembers, per library and bit width, the last library loaded and the last
//! one downloaded. The file is a Java-style properties file named
//! `LibManager.properties` in the installation home:
//!
//! ```text
//! /dll/ngs-sdk/64/loaded/path=/home/user/.ncbi/lib64/libngs-sdk.so
//! /dll/ngs-sdk/64/loaded/version=2.10.0
//! /servers/sratoolkit-cgi=https://example.org/sratoolkit.cgi
//! ```

pub mod properties;
pub mod store;
