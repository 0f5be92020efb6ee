//! Utility functions shared by the pool and the manager

pub mod time;

pub use time::*;
