//! Core data models for the usage tracker.

mod period;
mod profile;
mod usage;

pub use period::*;
pub use profile::*;
pub use usage::*;
