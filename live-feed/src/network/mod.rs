//! Network state layer.
//!
//! Tracks connected/disconnected state and owns the ordered reconnect-callback list
//! that feed bindings use to resynchronize after an outage.

pub(crate) mod network_monitor;
