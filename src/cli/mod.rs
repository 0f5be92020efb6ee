//! Command-line interface for processing requests through the pool

pub mod demo;
pub mod process;

pub use demo::*;
pub use process::*;
