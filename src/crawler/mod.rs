//! Crawl phase: sample, classify, checkpoint
//!
//! The crawler repeatedly samples a random creation date, searches the
//! platform for repositories created that day, and sorts each candidate
//! into exactly one of the three id sets. Progress is checkpointed so a
//! run can be stopped and resumed at any point.

pub mod coordinator;

pub use coordinator::{run_search, Crawler};
