//! Feature registry and the feature-computation loop
//!
//! Feature names from configuration are resolved once, at startup, into a
//! closed [`Feature`] enumeration; computing a row is then a plain ordered
//! walk over typed variants with no string dispatch left at runtime.

pub mod computer;
pub mod registry;

pub use computer::{run_compute, FeatureComputer};
pub use registry::{Feature, FeatureValue};
