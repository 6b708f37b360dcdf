//! Result table output
//!
//! Feature rows land in an append-only CSV file: header row once, one data
//! row per computed repository, sentinel literal for uncomputable cells.

pub mod csv;

pub use csv::{FeatureTable, SENTINEL};
