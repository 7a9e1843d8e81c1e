//! Structured observability vocabulary.
//!
//! Library code emits `tracing` events whose `event` field is one of the names in
//! [`events`] and whose field keys follow [`fields`]. Nothing in this crate installs a
//! subscriber.

pub mod events;
pub mod fields;
