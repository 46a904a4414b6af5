//! Client of the NCBI library download service.
//!
//! Two requests, both form-encoded POSTs: `cmd=vers` returns the latest
//! version of a library as plain text, `cmd=lib` returns the library binary
//! for the given platform. A `412` answer means there is no build for that
//! platform.

pub mod manager;
pub mod request;
pub mod transport;
