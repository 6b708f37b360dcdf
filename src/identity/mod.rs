//! API identity pool and quota waiting
//!
//! One identity is one credential against the remote platform, with its own
//! quota and reset clock. The pool is the only place in the system allowed
//! to block on quota: it probes every identity, hands out the one with the
//! most remaining calls, and otherwise sleeps until the soonest reset.

pub mod pool;

pub use pool::{Identity, IdentityPool};
