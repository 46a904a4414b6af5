//! Where libraries are looked for and where downloads are written.

pub mod context;
pub mod creator;
pub mod iterator;
