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

//! Application-level facade over the registry, network monitor and feed hub.

use crate::config::RealtimeConfig;
use crate::feed::hub::FeedHub;
use crate::feed::live_feed::{FeedOptions, LiveFeed};
use crate::network::network_monitor::{NetworkMonitor, NetworkState, ReconnectRegistration};
use crate::observability::events;
use crate::registry::handle::SubscriptionHandle;
use crate::registry::subscription_registry::{
    RegistryStats, SubscribeError, SubscriptionRegistry,
};
use crate::registry::teardown::Teardown;
use std::sync::Arc;
use tracing::info;

const COMPONENT: &str = "realtime_manager";

/// One application's realtime state: a subscription registry, a network monitor and
/// the feed hub that ties live feeds to both.
///
/// Clones share the same state.
///
/// ```
/// use live_feed::{FeedKey, FeedOptions, RealtimeConfig, RealtimeManager, SnapshotSink, Teardown};
/// use live_feed::{Document, FeedError};
/// use std::sync::Arc;
///
/// let manager = RealtimeManager::new(RealtimeConfig::default());
/// let query = Arc::new(|sink: SnapshotSink| -> Result<Teardown, FeedError> {
///     sink.deliver(vec![Document::new("n1", serde_json::json!({ "title": "hello" }))]);
///     Ok(Teardown::noop())
/// });
///
/// let key = FeedKey::notifications("user1");
/// let first = manager.feed(FeedOptions::new(&key, query.clone(), |doc| Some(doc.id.clone())));
/// let second = manager.feed(FeedOptions::new(&key, query, |doc| Some(doc.id.clone())));
///
/// assert_eq!(manager.ref_count(key.as_key().as_str()), 2);
/// assert_eq!(first.view().items(), ["n1".to_string()]);
/// assert_eq!(second.view().items(), ["n1".to_string()]);
/// ```
#[derive(Clone)]
pub struct RealtimeManager {
    name: Arc<str>,
    registry: SubscriptionRegistry,
    network: NetworkMonitor,
    hub: Arc<FeedHub>,
}

impl Default for RealtimeManager {
    fn default() -> Self {
        Self::new(RealtimeConfig::default())
    }
}

impl RealtimeManager {
    pub fn new(config: RealtimeConfig) -> Self {
        let registry = SubscriptionRegistry::new();
        registry.set_debug_mode(config.debug);
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network.clone());

        info!(
            event = events::MANAGER_CREATE,
            component = COMPONENT,
            name = %config.name,
            debug = config.debug,
            "realtime manager created"
        );

        Self {
            name: Arc::from(config.name),
            registry,
            network,
            hub,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Binds a new live feed; see [`LiveFeed`].
    pub fn feed<T: Send + Sync + 'static>(&self, options: FeedOptions<T>) -> LiveFeed<T> {
        LiveFeed::open(self.registry.clone(), self.hub.clone(), options)
    }

    /// Number of mounted feeds bound to `key`.
    pub fn feed_count(&self, key: &str) -> usize {
        self.hub.member_count(key)
    }

    pub fn subscribe<F, E>(
        &self,
        key: impl Into<String>,
        open_feed: F,
    ) -> Result<SubscriptionHandle, SubscribeError<E>>
    where
        F: FnOnce() -> Result<Teardown, E>,
    {
        self.registry.subscribe(key, open_feed)
    }

    pub fn force_remove(&self, key: &str) -> bool {
        self.registry.force_remove(key)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.registry.is_active(key)
    }

    pub fn ref_count(&self, key: &str) -> usize {
        self.registry.ref_count(key)
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn unsubscribe_all(&self) {
        self.registry.unsubscribe_all()
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.registry.set_debug_mode(enabled)
    }

    pub fn network_state(&self) -> NetworkState {
        self.network.state()
    }

    pub fn is_connected(&self) -> bool {
        self.network.is_connected()
    }

    pub fn on_network_disconnect(&self) -> bool {
        self.network.on_network_disconnect()
    }

    pub fn on_network_reconnect(&self) -> bool {
        self.network.on_network_reconnect()
    }

    pub fn register_reconnect_callback(
        &self,
        id: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ReconnectRegistration {
        self.network.register_reconnect_callback(id, callback)
    }

    /// Tears down every listener, drops every reconnect callback and returns to
    /// `Connected`. Feeds still mounted keep their last view but are detached.
    pub fn reset(&self) {
        let stats = self.registry.stats();
        let channels = self.hub.channel_count();
        self.registry.unsubscribe_all();
        self.hub.clear();
        self.network.reset();

        info!(
            event = events::MANAGER_RESET,
            component = COMPONENT,
            name = %self.name,
            active_count = stats.active_count,
            channels,
            "realtime manager reset"
        );
    }
}
