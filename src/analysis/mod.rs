//! Per-repository metadata access and classification
//!
//! [`view::RepoView`] is the single window onto one candidate repository:
//! it fetches metadata lazily through the provider client and caches
//! listings only for the duration of one classification or one feature row.
//! [`classify`] holds the two ordered predicates of the crawl phase.

pub mod classify;
pub mod view;

pub use classify::{suitable, unmaintained};
pub use view::RepoView;
