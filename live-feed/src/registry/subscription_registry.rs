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

//! Refcounted live-listener registry keyed by logical feed key.

use crate::observability::{events, fields};
use crate::registry::handle::SubscriptionHandle;
use crate::registry::teardown::Teardown;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const COMPONENT: &str = "subscription_registry";

/// Emits a lifecycle event at `info` in debug mode and at `debug` otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Subscription failures.
pub enum SubscribeError<E> {
    /// The logical key was empty; nothing was registered.
    EmptyKey,
    /// The feed-opening function failed for the first subscriber of a generation.
    OpenFailed(E),
}

impl<E> SubscribeError<E> {
    /// Returns the feed-open failure, if that is what this is.
    pub fn into_open_error(self) -> Option<E> {
        match self {
            SubscribeError::EmptyKey => None,
            SubscribeError::OpenFailed(err) => Some(err),
        }
    }
}

impl<E: Debug> Debug for SubscribeError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::EmptyKey => write!(f, "EmptyKey"),
            SubscribeError::OpenFailed(err) => write!(f, "OpenFailed({err:?})"),
        }
    }
}

impl<E: Display> Display for SubscribeError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::EmptyKey => write!(f, "subscription key must not be empty"),
            SubscribeError::OpenFailed(err) => write!(f, "failed to open live feed: {err}"),
        }
    }
}

impl<E: Error + 'static> Error for SubscribeError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SubscribeError::EmptyKey => None,
            SubscribeError::OpenFailed(err) => Some(err),
        }
    }
}

/// Diagnostic snapshot of the registry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RegistryStats {
    pub active_count: usize,
    pub total_refs: usize,
    /// Active keys in lexicographic order.
    pub keys: Vec<String>,
}

enum ListenerSlot {
    /// `open_feed` is running outside the lock.
    Opening,
    Open(Teardown),
}

struct SubscriptionEntry {
    generation: u64,
    ref_count: usize,
    listener: ListenerSlot,
}

pub(crate) struct RegistryInner {
    entries: Mutex<HashMap<String, SubscriptionEntry>>,
    next_generation: AtomicU64,
    debug_mode: AtomicBool,
}

impl RegistryInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, SubscriptionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn verbose(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    /// Drops one reference of `generation`. Stale generations are ignored.
    pub(crate) fn release_generation(&self, key: &str, generation: u64) {
        let mut entries = self.lock_entries();
        let Some(entry) = entries
            .get_mut(key)
            .filter(|entry| entry.generation == generation)
        else {
            debug!(
                event = events::SUBSCRIPTION_RELEASE_STALE,
                component = COMPONENT,
                key,
                generation,
                "release ignored for ended generation"
            );
            return;
        };

        entry.ref_count -= 1;
        let ref_count = entry.ref_count;
        let removed = if ref_count == 0 {
            entries.remove(key)
        } else {
            None
        };
        drop(entries);

        lifecycle!(
            self.verbose(),
            event = events::SUBSCRIPTION_RELEASE,
            component = COMPONENT,
            key,
            generation,
            ref_count,
            "subscription released"
        );

        if let Some(entry) = removed {
            self.finish_entry(key, entry, fields::REASON_LAST_RELEASE);
        }
    }

    /// Removes `generation` of `key` regardless of its ref count.
    pub(crate) fn retire_generation(&self, key: &str, generation: u64) -> bool {
        let removed = {
            let mut entries = self.lock_entries();
            let current = entries
                .get(key)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                entries.remove(key)
            } else {
                None
            }
        };

        match removed {
            Some(entry) => {
                self.finish_entry(key, entry, fields::REASON_RETIRED);
                true
            }
            None => false,
        }
    }

    fn finish_entry(&self, key: &str, entry: SubscriptionEntry, reason: &'static str) {
        let generation = entry.generation;
        match entry.listener {
            ListenerSlot::Open(teardown) => {
                lifecycle!(
                    self.verbose(),
                    event = events::SUBSCRIPTION_TEARDOWN,
                    component = COMPONENT,
                    key,
                    generation,
                    reason,
                    "tearing down live listener"
                );
                teardown.run_isolated(key, generation);
            }
            // The opener tears down on completion once it sees the entry is gone.
            ListenerSlot::Opening => {
                debug!(
                    event = events::SUBSCRIPTION_TEARDOWN,
                    component = COMPONENT,
                    key,
                    generation,
                    reason,
                    "generation ended while opening"
                );
            }
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let entries = std::mem::take(
            self.entries
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (key, entry) in entries {
            if let ListenerSlot::Open(teardown) = entry.listener {
                teardown.run_isolated(&key, entry.generation);
            }
        }
    }
}

/// Removes an `Opening` entry if `open_feed` unwinds.
struct OpeningGuard<'a> {
    inner: &'a RegistryInner,
    key: &'a str,
    generation: u64,
    armed: bool,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.inner.lock_entries();
        if matches!(entries.get(self.key), Some(entry) if entry.generation == self.generation) {
            entries.remove(self.key);
        }
    }
}

/// Deduplicating registry of live listeners.
///
/// Many consumers may [`subscribe`](Self::subscribe) to the same logical key; only the
/// first subscriber of a generation opens the underlying listener and the last
/// [`SubscriptionHandle`] release tears it down. Clones share state.
///
/// ```
/// use live_feed::{SubscriptionRegistry, Teardown};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let registry = SubscriptionRegistry::new();
/// let closed = Arc::new(AtomicUsize::new(0));
///
/// let open = |closed: Arc<AtomicUsize>| {
///     move || -> Result<Teardown, std::convert::Infallible> {
///         Ok(Teardown::new(move || {
///             closed.fetch_add(1, Ordering::SeqCst);
///         }))
///     }
/// };
///
/// let first = registry.subscribe("notifications:user1", open(closed.clone())).unwrap();
/// let second = registry.subscribe("notifications:user1", open(closed.clone())).unwrap();
/// assert_eq!(registry.ref_count("notifications:user1"), 2);
///
/// first.release();
/// assert!(registry.is_active("notifications:user1"));
/// second.release();
/// assert!(!registry.is_active("notifications:user1"));
/// assert_eq!(closed.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                debug_mode: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes to `key`, opening the listener only for the first subscriber.
    ///
    /// `open_feed` runs synchronously and without the registry lock held, so it may call
    /// back into the registry. Its error is returned as [`SubscribeError::OpenFailed`]
    /// and leaves no entry behind.
    pub fn subscribe<F, E>(
        &self,
        key: impl Into<String>,
        open_feed: F,
    ) -> Result<SubscriptionHandle, SubscribeError<E>>
    where
        F: FnOnce() -> Result<Teardown, E>,
    {
        self.subscribe_tagged(key, |_| open_feed())
    }

    /// Like [`subscribe`](Self::subscribe), but `open_feed` is told the generation it
    /// opens.
    pub(crate) fn subscribe_tagged<F, E>(
        &self,
        key: impl Into<String>,
        open_feed: F,
    ) -> Result<SubscriptionHandle, SubscribeError<E>>
    where
        F: FnOnce(u64) -> Result<Teardown, E>,
    {
        let key = key.into();
        if key.is_empty() {
            warn!(
                event = events::SUBSCRIPTION_REJECT_EMPTY_KEY,
                component = COMPONENT,
                "rejecting subscription with empty key"
            );
            return Err(SubscribeError::EmptyKey);
        }

        let generation = {
            let mut entries = self.inner.lock_entries();
            if let Some(entry) = entries.get_mut(&key) {
                entry.ref_count += 1;
                let (generation, ref_count) = (entry.generation, entry.ref_count);
                drop(entries);
                lifecycle!(
                    self.inner.verbose(),
                    event = events::SUBSCRIPTION_REUSE,
                    component = COMPONENT,
                    key = %key,
                    generation,
                    ref_count,
                    "reusing live listener"
                );
                return Ok(SubscriptionHandle::new(&self.inner, key, generation));
            }

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            entries.insert(
                key.clone(),
                SubscriptionEntry {
                    generation,
                    ref_count: 1,
                    listener: ListenerSlot::Opening,
                },
            );
            generation
        };

        lifecycle!(
            self.inner.verbose(),
            event = events::SUBSCRIPTION_OPEN_START,
            component = COMPONENT,
            key = %key,
            generation,
            "opening live listener"
        );

        let mut guard = OpeningGuard {
            inner: self.inner.as_ref(),
            key: &key,
            generation,
            armed: true,
        };
        let opened = open_feed(generation);
        guard.armed = false;
        drop(guard);

        match opened {
            Ok(teardown) => {
                let orphaned = {
                    let mut entries = self.inner.lock_entries();
                    match entries.get_mut(&key) {
                        Some(entry) if entry.generation == generation => {
                            entry.listener = ListenerSlot::Open(teardown);
                            None
                        }
                        _ => Some(teardown),
                    }
                };

                if let Some(teardown) = orphaned {
                    debug!(
                        event = events::SUBSCRIPTION_OPEN_ABANDONED,
                        component = COMPONENT,
                        key = %key,
                        generation,
                        reason = fields::REASON_GENERATION_ENDED,
                        "generation ended before listener opened; closing it"
                    );
                    teardown.run_isolated(&key, generation);
                } else {
                    lifecycle!(
                        self.inner.verbose(),
                        event = events::SUBSCRIPTION_OPEN_OK,
                        component = COMPONENT,
                        key = %key,
                        generation,
                        "live listener opened"
                    );
                }

                Ok(SubscriptionHandle::new(&self.inner, key, generation))
            }
            Err(err) => {
                {
                    let mut entries = self.inner.lock_entries();
                    if matches!(entries.get(&key), Some(entry) if entry.generation == generation)
                    {
                        entries.remove(&key);
                    }
                }
                warn!(
                    event = events::SUBSCRIPTION_OPEN_FAILED,
                    component = COMPONENT,
                    key = %key,
                    generation,
                    "unable to open live listener"
                );
                Err(SubscribeError::OpenFailed(err))
            }
        }
    }

    /// Tears down `key` immediately regardless of outstanding references.
    ///
    /// Handles of the removed generation become no-ops. Returns `false` for unknown keys.
    pub fn force_remove(&self, key: &str) -> bool {
        let removed = self.inner.lock_entries().remove(key);
        match removed {
            Some(entry) => {
                info!(
                    event = events::SUBSCRIPTION_FORCE_REMOVE,
                    component = COMPONENT,
                    key,
                    generation = entry.generation,
                    ref_count = entry.ref_count,
                    "force removing subscription"
                );
                self.inner
                    .finish_entry(key, entry, fields::REASON_FORCE_REMOVED);
                true
            }
            None => {
                debug!(
                    event = events::SUBSCRIPTION_FORCE_REMOVE_MISSING,
                    component = COMPONENT,
                    key,
                    "no subscription to force remove"
                );
                false
            }
        }
    }

    /// Releases `handle` and ends its generation if that generation is still current.
    ///
    /// Returns `true` when a listener generation was ended by this call. A handle that
    /// was already released is left alone.
    pub fn retire(&self, handle: &SubscriptionHandle) -> bool {
        if !handle.mark_released() {
            return false;
        }
        self.inner
            .retire_generation(handle.key(), handle.generation())
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.inner.lock_entries().contains_key(key)
    }

    /// Current reference count, `0` when `key` has no entry.
    pub fn ref_count(&self, key: &str) -> usize {
        self.inner
            .lock_entries()
            .get(key)
            .map(|entry| entry.ref_count)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> RegistryStats {
        let entries = self.inner.lock_entries();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        RegistryStats {
            active_count: entries.len(),
            total_refs: entries.values().map(|entry| entry.ref_count).sum(),
            keys,
        }
    }

    /// Tears down every active listener and clears the registry.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<(String, SubscriptionEntry)> =
            self.inner.lock_entries().drain().collect();

        info!(
            event = events::SUBSCRIPTION_UNSUBSCRIBE_ALL,
            component = COMPONENT,
            active_count = drained.len(),
            "unsubscribing all live listeners"
        );

        for (key, entry) in drained {
            self.inner
                .finish_entry(&key, entry, fields::REASON_UNSUBSCRIBE_ALL);
        }
    }

    /// Logs every subscribe/release transition at `info` while enabled.
    pub fn set_debug_mode(&self, enabled: bool) {
        self.inner.debug_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_mode(&self) -> bool {
        self.inner.verbose()
    }
}
