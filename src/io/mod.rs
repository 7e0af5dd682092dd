//! I/O modules for SAFE products

pub mod safe;

pub use safe::{compress_safe, CompressOptions};
