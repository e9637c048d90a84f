//! Shared core: name registry and value types (no I/O, compiles everywhere)

pub mod paths;
pub mod types;
