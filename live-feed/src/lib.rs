/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # live-feed
//!
//! `live-feed` multiplexes realtime query listeners: consumers that ask for the same
//! logical key share one underlying listener, which is opened for the first consumer
//! and closed after the last one lets go. A network monitor re-opens listeners once
//! connectivity comes back.
//!
//! Typical usage goes through [`RealtimeManager`] and [`LiveFeed`]; the
//! [`SubscriptionRegistry`] and [`NetworkMonitor`] are usable on their own.
//!
//! ## Registry contract
//!
//! ```
//! use live_feed::{SubscribeError, SubscriptionRegistry, Teardown};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let registry = SubscriptionRegistry::new();
//! let opened = Arc::new(AtomicUsize::new(0));
//! let closed = Arc::new(AtomicUsize::new(0));
//!
//! let open = || {
//!     opened.fetch_add(1, Ordering::SeqCst);
//!     let closed = closed.clone();
//!     Ok::<_, String>(Teardown::new(move || {
//!         closed.fetch_add(1, Ordering::SeqCst);
//!     }))
//! };
//!
//! let first = registry.subscribe("notifications:user1", open).unwrap();
//! let second = registry.subscribe("notifications:user1", open).unwrap();
//! assert_eq!(opened.load(Ordering::SeqCst), 1);
//!
//! assert!(first.release());
//! assert!(!first.release());
//! assert!(registry.is_active("notifications:user1"));
//!
//! drop(second);
//! assert_eq!(closed.load(Ordering::SeqCst), 1);
//! assert!(!registry.is_active("notifications:user1"));
//!
//! let failed = registry.subscribe("work_log:w1", || Err::<Teardown, _>("denied".to_string()));
//! assert!(matches!(failed, Err(SubscribeError::OpenFailed(_))));
//! assert_eq!(registry.ref_count("work_log:w1"), 0);
//! ```
//!
//! ## Keys
//!
//! [`FeedKey`] renders the canonical key for each resource, so equal descriptors always
//! produce byte-identical keys and caller-supplied ids cannot forge a separator.
//!
//! ## Internal architecture map
//!
//! - Registry: key -> listener entries, ref counts, generations, teardowns
//! - Network: connectivity state and ordered reconnect callbacks
//! - Feed: live-query boundary, per-key snapshot channels, consumer bindings
//! - Manager: one application's registry, monitor and feed hub behind a facade
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and never initializes a global subscriber. Binaries and
//! tests are responsible for one-time `tracing_subscriber` initialization at process
//! boundaries. With debug mode on, registry lifecycle events are raised to `info`.

mod config;
pub use config::{ConfigError, RealtimeConfig};

mod feed;
pub use feed::live_feed::{FeedOptions, FeedStatus, FeedView, LiveFeed};
pub use feed::query::{Document, FeedError, FeedErrorCode, LiveQuery, SnapshotSink};

mod keys;
pub use keys::FeedKey;

mod manager;
pub use manager::RealtimeManager;

mod network;
pub use network::network_monitor::{NetworkMonitor, NetworkState, ReconnectRegistration};

#[doc(hidden)]
pub mod observability;

mod registry;
pub use registry::handle::SubscriptionHandle;
pub use registry::subscription_registry::{RegistryStats, SubscribeError, SubscriptionRegistry};
pub use registry::teardown::Teardown;
