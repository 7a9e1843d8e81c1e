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

//! Per-key snapshot channels shared by every live feed bound to the same key.

use crate::feed::query::ChannelSignal;
use crate::network::network_monitor::{NetworkMonitor, ReconnectRegistration};
use crate::observability::events;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

const COMPONENT: &str = "feed_hub";

/// A binding that can be detached from and re-attached to its key's listener.
pub(crate) trait FeedMember: Send + Sync {
    /// Gives up the binding's subscription, ending its generation if still current.
    fn detach(&self);
    /// Subscribes again, joining or opening the key's current generation.
    fn attach(&self);
}

struct KeyChannel {
    sender: Arc<watch::Sender<ChannelSignal>>,
    members: Vec<(Uuid, Weak<dyn FeedMember>)>,
    _reconnect: ReconnectRegistration,
}

/// Fans one listener's snapshots out to every live feed of a key.
///
/// The hub registers a single reconnect callback per key, so a network recovery
/// reopens each key's listener once no matter how many feeds are bound to it.
pub(crate) struct FeedHub {
    network: NetworkMonitor,
    channels: Mutex<HashMap<String, KeyChannel>>,
}

impl FeedHub {
    pub(crate) fn new(network: NetworkMonitor) -> Arc<Self> {
        Arc::new(Self {
            network,
            channels: Mutex::new(HashMap::new()),
        })
    }

    fn lock_channels(&self) -> MutexGuard<'_, HashMap<String, KeyChannel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `member` to `key`'s channel, creating the channel on first use.
    pub(crate) fn join(
        self: &Arc<Self>,
        key: &str,
        member_id: Uuid,
        member: Weak<dyn FeedMember>,
    ) -> (Arc<watch::Sender<ChannelSignal>>, watch::Receiver<ChannelSignal>) {
        let mut channels = self.lock_channels();
        let channel = channels
            .entry(key.to_string())
            .or_insert_with(|| self.open_channel(key));
        channel.members.push((member_id, member));
        (channel.sender.clone(), channel.sender.subscribe())
    }

    fn open_channel(self: &Arc<Self>, key: &str) -> KeyChannel {
        let (sender, _) = watch::channel(ChannelSignal::unclaimed());
        let hub = Arc::downgrade(self);
        let restart_key = key.to_string();
        let reconnect = self
            .network
            .register_feed_restart(reconnect_id(key), move || {
                if let Some(hub) = hub.upgrade() {
                    hub.restart(&restart_key);
                }
            });
        KeyChannel {
            sender: Arc::new(sender),
            members: Vec::new(),
            _reconnect: reconnect,
        }
    }

    /// Removes `member_id` from `key`; the last member to leave closes the channel.
    pub(crate) fn leave(&self, key: &str, member_id: Uuid) {
        let closed = {
            let mut channels = self.lock_channels();
            let Some(channel) = channels.get_mut(key) else {
                return;
            };
            channel.members.retain(|(id, _)| *id != member_id);
            if channel.members.is_empty() {
                channels.remove(key)
            } else {
                None
            }
        };

        if closed.is_some() {
            debug!(
                event = events::FEED_CHANNEL_PRUNED,
                component = COMPONENT,
                key,
                "last feed left; channel closed"
            );
        }
    }

    /// Re-opens `key`'s listener once and re-attaches every bound feed to it.
    pub(crate) fn restart(&self, key: &str) {
        let members: Vec<Arc<dyn FeedMember>> = {
            let channels = self.lock_channels();
            let Some(channel) = channels.get(key) else {
                return;
            };
            channel
                .members
                .iter()
                .filter_map(|(_, member)| member.upgrade())
                .collect()
        };

        info!(
            event = events::FEED_RECONNECT,
            component = COMPONENT,
            key,
            members = members.len(),
            "restarting live listener"
        );

        for member in &members {
            member.detach();
        }
        for member in &members {
            member.attach();
        }
    }

    /// Forgets every channel. Feeds still mounted keep their last view but are no
    /// longer restarted by network recovery.
    pub(crate) fn clear(&self) {
        let drained: Vec<KeyChannel> = self
            .lock_channels()
            .drain()
            .map(|(_, channel)| channel)
            .collect();
        drop(drained);
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.lock_channels().len()
    }

    pub(crate) fn member_count(&self, key: &str) -> usize {
        self.lock_channels()
            .get(key)
            .map(|channel| channel.members.len())
            .unwrap_or(0)
    }
}

/// Reconnect-callback id used for `key`.
pub(crate) fn reconnect_id(key: &str) -> String {
    format!("feed:{key}")
}

#[cfg(test)]
mod tests {
    use super::{reconnect_id, FeedHub, FeedMember};
    use crate::network::network_monitor::NetworkMonitor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, Weak};
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingMember {
        calls: Mutex<Vec<&'static str>>,
        attached: AtomicUsize,
    }

    impl FeedMember for CountingMember {
        fn detach(&self) {
            self.calls.lock().unwrap().push("detach");
        }

        fn attach(&self) {
            self.calls.lock().unwrap().push("attach");
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn as_member(member: &Arc<CountingMember>) -> Weak<dyn FeedMember> {
        let member: Arc<dyn FeedMember> = member.clone();
        Arc::downgrade(&member)
    }

    #[test]
    fn one_reconnect_callback_per_key() {
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network.clone());
        let first = Arc::new(CountingMember::default());
        let second = Arc::new(CountingMember::default());

        let (_, _rx1) = hub.join("notifications:u1", Uuid::new_v4(), as_member(&first));
        let (_, _rx2) = hub.join("notifications:u1", Uuid::new_v4(), as_member(&second));

        assert_eq!(hub.channel_count(), 1);
        assert_eq!(hub.member_count("notifications:u1"), 2);
        assert_eq!(
            network.callback_ids(),
            vec![reconnect_id("notifications:u1")]
        );
    }

    #[test]
    fn restart_detaches_everyone_before_reattaching() {
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network.clone());
        let first = Arc::new(CountingMember::default());
        let second = Arc::new(CountingMember::default());
        let (_, _rx1) = hub.join("schedules:u1", Uuid::new_v4(), as_member(&first));
        let (_, _rx2) = hub.join("schedules:u1", Uuid::new_v4(), as_member(&second));

        assert!(network.on_network_disconnect());
        assert!(network.on_network_reconnect());

        assert_eq!(*first.calls.lock().unwrap(), vec!["detach", "attach"]);
        assert_eq!(*second.calls.lock().unwrap(), vec!["detach", "attach"]);
    }

    #[test]
    fn last_leave_closes_channel_and_unregisters_callback() {
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network.clone());
        let member = Arc::new(CountingMember::default());
        let (first_id, second_id) = (Uuid::new_v4(), Uuid::new_v4());
        let (_, _rx1) = hub.join("work_log:u1", first_id, as_member(&member));
        let (_, _rx2) = hub.join("work_log:u1", second_id, as_member(&member));

        hub.leave("work_log:u1", first_id);
        assert_eq!(hub.channel_count(), 1);
        assert_eq!(network.callback_count(), 1);

        hub.leave("work_log:u1", second_id);
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(network.callback_count(), 0);

        hub.leave("work_log:u1", second_id);
    }

    #[test]
    fn application_callback_cannot_replace_restart_callback() {
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network.clone());
        let member = Arc::new(CountingMember::default());
        let (_, _rx) = hub.join("notifications:u1", Uuid::new_v4(), as_member(&member));
        let app_calls = Arc::new(AtomicUsize::new(0));
        let counter = app_calls.clone();

        let app = network.register_reconnect_callback(reconnect_id("notifications:u1"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(network.callback_count(), 2);

        assert!(network.on_network_disconnect());
        assert!(network.on_network_reconnect());
        assert_eq!(member.attached.load(Ordering::SeqCst), 1);
        assert_eq!(app_calls.load(Ordering::SeqCst), 1);

        assert!(app.unregister());
        assert_eq!(network.callback_count(), 1);
        assert!(network.on_network_disconnect());
        assert!(network.on_network_reconnect());
        assert_eq!(member.attached.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restart_skips_dropped_members() {
        let network = NetworkMonitor::new();
        let hub = FeedHub::new(network);
        let kept = Arc::new(CountingMember::default());
        let gone = Arc::new(CountingMember::default());
        let (_, _rx1) = hub.join("confirmed_staff", Uuid::new_v4(), as_member(&kept));
        let (_, _rx2) = hub.join("confirmed_staff", Uuid::new_v4(), as_member(&gone));
        drop(gone);

        hub.restart("confirmed_staff");
        hub.restart("unknown");

        assert_eq!(kept.attached.load(Ordering::SeqCst), 1);
    }
}
