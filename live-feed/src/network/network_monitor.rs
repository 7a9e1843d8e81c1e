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

//! Connectivity state and reconnect-callback fan-out.

use crate::observability::{events, fields};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

const COMPONENT: &str = "network_monitor";

/// Process-visible connectivity state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    #[default]
    Connected,
    Disconnected,
}

type ReconnectCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Namespace a callback id lives in. Ids only replace each other within a scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CallbackScope {
    Application,
    /// Per-key restart callbacks owned by the feed hub.
    FeedRestart,
}

struct CallbackSlot {
    scope: CallbackScope,
    id: String,
    serial: u64,
    callback: ReconnectCallback,
}

struct MonitorState {
    network: NetworkState,
    /// Registration order; a replaced id keeps its slot.
    callbacks: Vec<CallbackSlot>,
}

pub(crate) struct MonitorInner {
    state: Mutex<MonitorState>,
    next_serial: AtomicU64,
}

impl MonitorInner {
    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unregister(&self, id: &str, serial: u64) -> bool {
        let mut state = self.lock_state();
        let Some(position) = state
            .callbacks
            .iter()
            .position(|slot| slot.id == id && slot.serial == serial)
        else {
            return false;
        };
        state.callbacks.remove(position);
        true
    }
}

/// Tracks connectivity and notifies reconnect callbacks once per outage recovery.
///
/// ```
/// use live_feed::NetworkMonitor;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let monitor = NetworkMonitor::new();
/// let refreshed = Arc::new(AtomicUsize::new(0));
/// let counter = refreshed.clone();
/// let _registration = monitor.register_reconnect_callback("sync", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(!monitor.on_network_reconnect());
/// assert!(monitor.on_network_disconnect());
/// assert!(monitor.on_network_reconnect());
/// assert_eq!(refreshed.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    /// Creates a monitor in the `Connected` state with no callbacks.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(MonitorState {
                    network: NetworkState::Connected,
                    callbacks: Vec::new(),
                }),
                next_serial: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> NetworkState {
        self.inner.lock_state().network
    }

    pub fn is_connected(&self) -> bool {
        self.state() == NetworkState::Connected
    }

    /// Connected -> Disconnected. Returns `false` when already disconnected.
    pub fn on_network_disconnect(&self) -> bool {
        let mut state = self.inner.lock_state();
        if state.network == NetworkState::Disconnected {
            drop(state);
            debug!(
                event = events::NETWORK_TRANSITION_IGNORED,
                component = COMPONENT,
                reason = "already_disconnected",
                "ignoring disconnect"
            );
            return false;
        }
        state.network = NetworkState::Disconnected;
        drop(state);

        info!(
            event = events::NETWORK_DISCONNECT,
            component = COMPONENT,
            "network disconnected"
        );
        true
    }

    /// Disconnected -> Connected, then runs every registered reconnect callback.
    ///
    /// Callbacks run in registration order, synchronously, before this returns. A
    /// panicking callback is logged and does not stop the rest. Returns `false` when
    /// already connected, in which case nothing runs.
    pub fn on_network_reconnect(&self) -> bool {
        let callbacks: Vec<(String, ReconnectCallback)> = {
            let mut state = self.inner.lock_state();
            if state.network == NetworkState::Connected {
                drop(state);
                debug!(
                    event = events::NETWORK_TRANSITION_IGNORED,
                    component = COMPONENT,
                    reason = "already_connected",
                    "ignoring reconnect"
                );
                return false;
            }
            state.network = NetworkState::Connected;
            state
                .callbacks
                .iter()
                .map(|slot| (slot.id.clone(), slot.callback.clone()))
                .collect()
        };

        info!(
            event = events::NETWORK_RECONNECT,
            component = COMPONENT,
            callback_count = callbacks.len(),
            "network reconnected"
        );

        for (callback_id, callback) in callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
                let err = fields::format_panic_payload(payload.as_ref());
                warn!(
                    event = events::RECONNECT_CALLBACK_PANICKED,
                    component = COMPONENT,
                    callback_id = %callback_id,
                    err = %err,
                    "reconnect callback panicked"
                );
            }
        }
        true
    }

    /// Registers `callback` under `id`, replacing any callback already held for `id`.
    ///
    /// Feed restart callbacks live in their own namespace, so no application id can
    /// replace them.
    pub fn register_reconnect_callback(
        &self,
        id: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ReconnectRegistration {
        self.register_scoped(CallbackScope::Application, id.into(), callback)
    }

    pub(crate) fn register_feed_restart(
        &self,
        id: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ReconnectRegistration {
        self.register_scoped(CallbackScope::FeedRestart, id.into(), callback)
    }

    fn register_scoped(
        &self,
        scope: CallbackScope,
        id: String,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ReconnectRegistration {
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let callback: ReconnectCallback = Arc::new(callback);

        let replaced = {
            let mut state = self.inner.lock_state();
            match state
                .callbacks
                .iter_mut()
                .find(|slot| slot.scope == scope && slot.id == id)
            {
                Some(slot) => {
                    slot.serial = serial;
                    slot.callback = callback;
                    true
                }
                None => {
                    state.callbacks.push(CallbackSlot {
                        scope,
                        id: id.clone(),
                        serial,
                        callback,
                    });
                    false
                }
            }
        };

        let event = if replaced {
            events::RECONNECT_CALLBACK_REPLACE
        } else {
            events::RECONNECT_CALLBACK_REGISTER
        };
        debug!(
            event,
            component = COMPONENT,
            callback_id = %id,
            scope = ?scope,
            "reconnect callback registered"
        );

        ReconnectRegistration {
            monitor: Arc::downgrade(&self.inner),
            id,
            serial,
            active: AtomicBool::new(true),
        }
    }

    pub fn callback_count(&self) -> usize {
        self.inner.lock_state().callbacks.len()
    }

    /// Ids of registered callbacks in invocation order.
    pub fn callback_ids(&self) -> Vec<String> {
        self.inner
            .lock_state()
            .callbacks
            .iter()
            .map(|slot| slot.id.clone())
            .collect()
    }

    /// Drops every callback and returns to `Connected` without notifying anyone.
    pub fn reset(&self) {
        let mut state = self.inner.lock_state();
        state.network = NetworkState::Connected;
        state.callbacks.clear();
    }

    /// Drives transitions from a stream of connectivity reports (`true` = online).
    ///
    /// Completes when the stream ends.
    pub async fn follow_connectivity(&self, reports: impl Stream<Item = bool>) {
        let mut reports = std::pin::pin!(reports);
        while let Some(online) = reports.next().await {
            if online {
                self.on_network_reconnect();
            } else {
                self.on_network_disconnect();
            }
        }
        debug!(
            event = events::CONNECTIVITY_STREAM_CLOSED,
            component = COMPONENT,
            state = ?self.state(),
            "connectivity stream ended"
        );
    }
}

/// Owner of one reconnect callback registration.
///
/// [`unregister`](Self::unregister) removes the callback; it is a no-op once already
/// unregistered or once a newer registration replaced the same id. Dropping the
/// registration unregisters it.
#[must_use = "dropping a ReconnectRegistration unregisters the callback immediately"]
pub struct ReconnectRegistration {
    monitor: Weak<MonitorInner>,
    id: String,
    serial: u64,
    active: AtomicBool,
}

impl ReconnectRegistration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns `true` only when this call removed the callback.
    pub fn unregister(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let Some(monitor) = self.monitor.upgrade() else {
            return false;
        };
        let removed = monitor.unregister(&self.id, self.serial);
        if removed {
            debug!(
                event = events::RECONNECT_CALLBACK_UNREGISTER,
                component = COMPONENT,
                callback_id = %self.id,
                "reconnect callback unregistered"
            );
        }
        removed
    }
}

impl Drop for ReconnectRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl Debug for ReconnectRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectRegistration")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{NetworkMonitor, NetworkState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn starts_connected_and_transitions_are_idempotent() {
        let monitor = NetworkMonitor::new();
        assert!(monitor.is_connected());

        assert!(monitor.on_network_disconnect());
        assert!(!monitor.on_network_disconnect());
        assert_eq!(monitor.state(), NetworkState::Disconnected);

        assert!(monitor.on_network_reconnect());
        assert!(!monitor.on_network_reconnect());
        assert!(monitor.is_connected());
    }

    #[test]
    fn reconnect_while_connected_invokes_nothing() {
        let monitor = NetworkMonitor::new();
        let (count, callback) = counter();
        let _registration = monitor.register_reconnect_callback("test", callback);

        monitor.on_network_reconnect();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn each_callback_runs_once_per_recovery() {
        let monitor = NetworkMonitor::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        let _a = monitor.register_reconnect_callback("a", first_cb);
        let _b = monitor.register_reconnect_callback("b", second_cb);

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();
        monitor.on_network_reconnect();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();
        assert_eq!(first.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callbacks_run_in_registration_order_and_replacement_keeps_slot() {
        let monitor = NetworkMonitor::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let push = |label: &'static str| {
            let order = order.clone();
            move || order.lock().unwrap().push(label)
        };

        let _first = monitor.register_reconnect_callback("first", push("first-v1"));
        let _second = monitor.register_reconnect_callback("second", push("second"));
        let _first_again = monitor.register_reconnect_callback("first", push("first-v2"));

        assert_eq!(monitor.callback_ids(), vec!["first", "second"]);

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();

        assert_eq!(*order.lock().unwrap(), vec!["first-v2", "second"]);
    }

    #[test]
    fn unregistered_callback_is_not_invoked() {
        let monitor = NetworkMonitor::new();
        let (count, callback) = counter();
        let registration = monitor.register_reconnect_callback("sync", callback);

        assert!(registration.unregister());
        assert!(!registration.unregister());

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.callback_count(), 0);
    }

    #[test]
    fn stale_registration_does_not_remove_replacement() {
        let monitor = NetworkMonitor::new();
        let (old_count, old_cb) = counter();
        let (new_count, new_cb) = counter();

        let old = monitor.register_reconnect_callback("sync", old_cb);
        let _new = monitor.register_reconnect_callback("sync", new_cb);

        assert!(!old.unregister());
        assert_eq!(monitor.callback_count(), 1);

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();

        assert_eq!(old_count.load(Ordering::SeqCst), 0);
        assert_eq!(new_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_others() {
        let monitor = NetworkMonitor::new();
        let (count, callback) = counter();
        let _bad = monitor.register_reconnect_callback("bad", || panic!("refresh failed"));
        let _good = monitor.register_reconnect_callback("good", callback);

        monitor.on_network_disconnect();
        assert!(monitor.on_network_reconnect());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(monitor.is_connected());
    }

    #[test]
    fn callbacks_may_reenter_the_monitor() {
        let monitor = NetworkMonitor::new();
        let reentrant = monitor.clone();
        let late = Arc::new(Mutex::new(None));
        let late_slot = late.clone();
        let (late_count, late_cb) = counter();
        let late_cb = Arc::new(late_cb);

        let _registration = monitor.register_reconnect_callback("registrar", move || {
            let late_cb = late_cb.clone();
            let registration =
                reentrant.register_reconnect_callback("late", move || late_cb());
            *late_slot.lock().unwrap() = Some(registration);
        });

        monitor.on_network_disconnect();
        monitor.on_network_reconnect();

        assert_eq!(late_count.load(Ordering::SeqCst), 0);
        assert!(late.lock().unwrap().is_some());
        assert_eq!(monitor.callback_count(), 2);
    }

    #[test]
    fn dropping_registration_unregisters() {
        let monitor = NetworkMonitor::new();
        let (_count, callback) = counter();
        {
            let _registration = monitor.register_reconnect_callback("scoped", callback);
            assert_eq!(monitor.callback_count(), 1);
        }
        assert_eq!(monitor.callback_count(), 0);
    }

    #[test]
    fn reset_restores_connected_and_clears_callbacks() {
        let monitor = NetworkMonitor::new();
        let (count, callback) = counter();
        let registration = monitor.register_reconnect_callback("sync", callback);
        monitor.on_network_disconnect();

        monitor.reset();

        assert!(monitor.is_connected());
        assert_eq!(monitor.callback_count(), 0);
        assert!(!registration.unregister());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn follow_connectivity_maps_reports_to_transitions() {
        let monitor = NetworkMonitor::new();
        let (count, callback) = counter();
        let _registration = monitor.register_reconnect_callback("sync", callback);

        monitor
            .follow_connectivity(futures::stream::iter(vec![true, false, false, true, true]))
            .await;

        assert!(monitor.is_connected());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
