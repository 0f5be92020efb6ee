//! Configuration for the appliance pool

pub mod settings;

pub use settings::*;
