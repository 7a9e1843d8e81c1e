//! Subscription registry layer.
//!
//! Owns the key -> listener mapping, reference counting and listener generations.
//! Every registry mutation is one synchronous critical section; feed-opening functions
//! and teardowns always run with the lock released.

pub(crate) mod handle;
pub(crate) mod subscription_registry;
pub(crate) mod teardown;
