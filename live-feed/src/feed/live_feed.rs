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

//! Consumer-side live feed bindings.

use crate::feed::hub::{FeedHub, FeedMember};
use crate::feed::query::{
    ChannelSignal, Document, FeedError, FeedSignal, LiveQuery, SnapshotSink,
};
use crate::observability::events;
use crate::registry::handle::SubscriptionHandle;
use crate::registry::subscription_registry::{SubscribeError, SubscriptionRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

const COMPONENT: &str = "live_feed";

type Parser<T> = Arc<dyn Fn(&Document) -> Option<T> + Send + Sync>;

/// What to watch and how to turn raw documents into items.
pub struct FeedOptions<T> {
    key: String,
    query: Arc<dyn LiveQuery>,
    parser: Parser<T>,
    enabled: bool,
}

impl<T> FeedOptions<T> {
    /// `parser` returning `None` skips that document. It runs while the feed's state
    /// is locked and must not call back into the same feed.
    pub fn new(
        key: impl Into<String>,
        query: Arc<dyn LiveQuery>,
        parser: impl Fn(&Document) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            query,
            parser: Arc::new(parser),
            enabled: true,
        }
    }

    /// A disabled feed opens nothing until [`LiveFeed::set_enabled`] turns it on.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T: DeserializeOwned + 'static> FeedOptions<T> {
    /// Options whose parser deserializes each document's data, with the document id
    /// filled in as `id` when the data does not carry one.
    pub fn deserialized(key: impl Into<String>, query: Arc<dyn LiveQuery>) -> Self {
        Self::new(key, query, deserialize_document::<T>)
    }
}

fn deserialize_document<T: DeserializeOwned>(document: &Document) -> Option<T> {
    let mut value = document.data.clone();
    if let serde_json::Value::Object(map) = &mut value {
        map.entry("id")
            .or_insert_with(|| serde_json::Value::String(document.id.clone()));
    }
    serde_json::from_value(value).ok()
}

/// Coarse lifecycle of a feed as seen by its consumer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Disabled or unmounted.
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Snapshot of a feed's consumer-visible state.
#[derive(Debug)]
pub struct FeedView<T> {
    /// Last parsed snapshot; kept while a reconnect is loading.
    pub data: Option<Arc<Vec<T>>>,
    pub is_loading: bool,
    /// Last observed failure, cleared by the next snapshot.
    pub error: Option<FeedError>,
}

impl<T> Clone for FeedView<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

impl<T> FeedView<T> {
    pub fn status(&self) -> FeedStatus {
        if self.is_loading {
            FeedStatus::Loading
        } else if self.error.is_some() {
            FeedStatus::Failed
        } else if self.data.is_some() {
            FeedStatus::Ready
        } else {
            FeedStatus::Idle
        }
    }

    /// Items of the last snapshot, empty before the first one.
    pub fn items(&self) -> &[T] {
        self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }
}

struct BindingSlot<T> {
    enabled: bool,
    channel: Option<(Arc<watch::Sender<ChannelSignal>>, watch::Receiver<ChannelSignal>)>,
    handle: Option<SubscriptionHandle>,
    view: FeedView<T>,
}

impl<T> BindingSlot<T> {
    /// Generation this binding holds a reference on. Signals of any other generation
    /// are not this binding's to show.
    fn generation(&self) -> Option<u64> {
        self.handle.as_ref().map(SubscriptionHandle::generation)
    }

    /// Latest channel value if this binding has not seen it yet.
    fn take_unseen(&mut self) -> Option<ChannelSignal> {
        let (_, receiver) = self.channel.as_mut()?;
        if !receiver.has_changed().unwrap_or(false) {
            return None;
        }
        let signal = receiver.borrow_and_update().clone();
        Some(signal)
    }

    /// Latest channel value, marking it seen.
    fn take_latest(&mut self) -> Option<ChannelSignal> {
        let (_, receiver) = self.channel.as_mut()?;
        let signal = receiver.borrow_and_update().clone();
        Some(signal)
    }

    fn reset_view(&mut self) {
        self.view = FeedView {
            data: None,
            is_loading: false,
            error: None,
        };
    }
}

struct FeedBinding<T> {
    key: String,
    instance_id: Uuid,
    query: Arc<dyn LiveQuery>,
    parser: Parser<T>,
    registry: SubscriptionRegistry,
    hub: Arc<FeedHub>,
    slot: Mutex<BindingSlot<T>>,
}

impl<T: Send + Sync + 'static> FeedBinding<T> {
    fn lock_slot(&self) -> MutexGuard<'_, BindingSlot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mount(self: &Arc<Self>) {
        {
            let mut slot = self.lock_slot();
            slot.enabled = true;
            if slot.channel.is_some() {
                return;
            }
            if self.key.is_empty() {
                warn!(
                    event = events::FEED_OPEN_FAILED,
                    component = COMPONENT,
                    instance_id = %self.instance_id,
                    "feed key is empty; nothing to watch"
                );
                slot.view = FeedView {
                    data: None,
                    is_loading: false,
                    error: Some(FeedError::invalid_argument("feed key must not be empty")),
                };
                return;
            }

            let member: Arc<dyn FeedMember> = self.clone();
            slot.channel = Some(
                self.hub
                    .join(&self.key, self.instance_id, Arc::downgrade(&member)),
            );
            slot.view.is_loading = true;
            slot.view.error = None;
        }

        self.subscribe();

        debug!(
            event = events::FEED_MOUNT,
            component = COMPONENT,
            key = %self.key,
            instance_id = %self.instance_id,
            "live feed mounted"
        );
    }

    fn unmount(&self) {
        let (handle, was_mounted) = {
            let mut slot = self.lock_slot();
            slot.enabled = false;
            let handle = slot.handle.take();
            let was_mounted = slot.channel.take().is_some();
            slot.reset_view();
            (handle, was_mounted)
        };
        drop(handle);

        if was_mounted {
            self.hub.leave(&self.key, self.instance_id);
            debug!(
                event = events::FEED_UNMOUNT,
                component = COMPONENT,
                key = %self.key,
                instance_id = %self.instance_id,
                "live feed unmounted"
            );
        }
    }

    /// Takes a reference on the key's current generation, opening one if needed.
    ///
    /// The slot lock is not held while the registry runs `LiveQuery::watch`, so the
    /// query may re-enter this feed, its hub or the network monitor.
    fn subscribe(&self) {
        let sender = {
            let slot = self.lock_slot();
            if slot.handle.is_some() {
                return;
            }
            match slot.channel.as_ref() {
                Some((sender, _)) => sender.clone(),
                None => return,
            }
        };
        let query = self.query.clone();
        let key = self.key.clone();

        let subscribed = self
            .registry
            .subscribe_tagged(self.key.clone(), move |generation| {
                sender.send_replace(ChannelSignal::new(generation, FeedSignal::Pending));
                let sink = SnapshotSink::new(&key, generation, sender.clone());
                let silence = sink.close_on_teardown();
                match query.watch(sink) {
                    Ok(teardown) => Ok(silence.chain(teardown)),
                    Err(err) => {
                        silence.run();
                        sender.send_replace(ChannelSignal::new(
                            generation,
                            FeedSignal::Failed(err.clone()),
                        ));
                        Err(err)
                    }
                }
            });

        match subscribed {
            Ok(handle) => {
                let surplus = self.store_handle(handle);
                drop(surplus);
            }
            Err(err) => self.record_open_failure(err),
        }
    }

    /// Keeps `handle` unless the feed was unmounted or re-subscribed while the
    /// registry call ran. A returned handle must be dropped after the lock is released.
    fn store_handle(&self, handle: SubscriptionHandle) -> Option<SubscriptionHandle> {
        let mut slot = self.lock_slot();
        if slot.channel.is_none() || slot.handle.is_some() {
            return Some(handle);
        }
        slot.handle = Some(handle);
        if let Some(signal) = slot.take_latest() {
            self.apply(&mut slot, signal);
        }
        None
    }

    fn record_open_failure(&self, err: SubscribeError<FeedError>) {
        let err = match err {
            SubscribeError::EmptyKey => FeedError::invalid_argument("feed key must not be empty"),
            SubscribeError::OpenFailed(err) => err,
        };
        warn!(
            event = events::FEED_OPEN_FAILED,
            component = COMPONENT,
            key = %self.key,
            instance_id = %self.instance_id,
            err = %err,
            "unable to open live feed"
        );

        let mut slot = self.lock_slot();
        if slot.channel.is_none() || slot.handle.is_some() {
            return;
        }
        slot.take_latest();
        slot.view.is_loading = false;
        slot.view.error = Some(err);
    }

    fn apply(&self, slot: &mut BindingSlot<T>, published: ChannelSignal) {
        if slot.generation() != Some(published.generation) {
            debug!(
                event = events::FEED_SIGNAL_FOREIGN_GENERATION,
                component = COMPONENT,
                key = %self.key,
                instance_id = %self.instance_id,
                generation = published.generation,
                "ignoring signal of a generation this feed holds no reference on"
            );
            return;
        }

        match published.signal {
            FeedSignal::Pending => {
                slot.view.is_loading = true;
            }
            FeedSignal::Snapshot(documents) => {
                let items = self.parse(&documents);
                debug!(
                    event = events::FEED_SNAPSHOT,
                    component = COMPONENT,
                    key = %self.key,
                    instance_id = %self.instance_id,
                    documents = documents.len(),
                    items = items.len(),
                    "snapshot applied"
                );
                slot.view = FeedView {
                    data: Some(Arc::new(items)),
                    is_loading: false,
                    error: None,
                };
            }
            FeedSignal::Failed(err) => {
                debug!(
                    event = events::FEED_RUNTIME_ERROR,
                    component = COMPONENT,
                    key = %self.key,
                    instance_id = %self.instance_id,
                    err = %err,
                    "live feed reported an error"
                );
                slot.view.is_loading = false;
                slot.view.error = Some(err);
            }
        }
    }

    fn parse(&self, documents: &[Document]) -> Vec<T> {
        documents
            .iter()
            .filter_map(|document| {
                let parsed = (self.parser)(document);
                if parsed.is_none() {
                    debug!(
                        event = events::FEED_ITEM_SKIPPED,
                        component = COMPONENT,
                        key = %self.key,
                        document_id = %document.id,
                        "document rejected by parser"
                    );
                }
                parsed
            })
            .collect()
    }

    fn view(&self) -> FeedView<T> {
        let mut slot = self.lock_slot();
        if let Some(signal) = slot.take_unseen() {
            self.apply(&mut slot, signal);
        }
        slot.view.clone()
    }

    fn receiver(&self) -> Option<watch::Receiver<ChannelSignal>> {
        self.lock_slot()
            .channel
            .as_ref()
            .map(|(_, receiver)| receiver.clone())
    }
}

impl<T: Send + Sync + 'static> FeedMember for FeedBinding<T> {
    fn detach(&self) {
        let handle = {
            let mut slot = self.lock_slot();
            if slot.channel.is_some() {
                slot.view.is_loading = true;
            }
            slot.handle.take()
        };
        if let Some(handle) = handle {
            self.registry.retire(&handle);
        }
    }

    fn attach(&self) {
        self.subscribe();
    }
}

/// A consumer's binding to one live-data key.
///
/// Every feed bound to the same key shares one registry subscription per feed and one
/// underlying listener: the first mount opens it, later mounts join it and see its
/// latest snapshot immediately. Dropping the feed unmounts it.
pub struct LiveFeed<T: Send + Sync + 'static> {
    binding: Arc<FeedBinding<T>>,
}

impl<T: Send + Sync + 'static> LiveFeed<T> {
    pub(crate) fn open(
        registry: SubscriptionRegistry,
        hub: Arc<FeedHub>,
        options: FeedOptions<T>,
    ) -> Self {
        let FeedOptions {
            key,
            query,
            parser,
            enabled,
        } = options;
        let binding = Arc::new(FeedBinding {
            key,
            instance_id: Uuid::new_v4(),
            query,
            parser,
            registry,
            hub,
            slot: Mutex::new(BindingSlot {
                enabled: false,
                channel: None,
                handle: None,
                view: FeedView {
                    data: None,
                    is_loading: false,
                    error: None,
                },
            }),
        });
        if enabled {
            binding.mount();
        }
        Self { binding }
    }

    pub fn key(&self) -> &str {
        &self.binding.key
    }

    /// Unique per binding; appears in this feed's log events.
    pub fn instance_id(&self) -> Uuid {
        self.binding.instance_id
    }

    /// Current state, absorbing any snapshot published since the last call.
    pub fn view(&self) -> FeedView<T> {
        self.binding.view()
    }

    pub fn status(&self) -> FeedStatus {
        self.view().status()
    }

    pub fn is_enabled(&self) -> bool {
        self.binding.lock_slot().enabled
    }

    /// Waits until the key publishes something this feed has not seen.
    ///
    /// Returns `false` immediately when the feed is not mounted.
    pub async fn changed(&self) -> bool {
        let Some(mut receiver) = self.binding.receiver() else {
            return false;
        };
        receiver.changed().await.is_ok()
    }

    /// Forces the key's listener to reopen; every feed of the key re-attaches to it.
    pub fn reconnect(&self) {
        let mounted = self.binding.lock_slot().channel.is_some();
        if !mounted {
            debug!(
                event = events::FEED_RECONNECT,
                component = COMPONENT,
                key = %self.binding.key,
                instance_id = %self.binding.instance_id,
                "reconnect ignored; feed is not mounted"
            );
            return;
        }
        self.binding.hub.restart(&self.binding.key);
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.binding.mount();
        } else {
            self.binding.unmount();
        }
    }
}

impl<T: Send + Sync + 'static> Drop for LiveFeed<T> {
    fn drop(&mut self) {
        self.binding.unmount();
    }
}

impl<T: Send + Sync + 'static> Debug for LiveFeed<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let slot = self.binding.lock_slot();
        f.debug_struct("LiveFeed")
            .field("key", &self.binding.key)
            .field("instance_id", &self.binding.instance_id)
            .field("enabled", &slot.enabled)
            .field("status", &slot.view.status())
            .finish()
    }
}
