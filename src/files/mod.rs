//! File helpers shared by the cache and the report writer.

pub mod atomic;

pub use atomic::write_atomic;
