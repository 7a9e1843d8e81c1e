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

//! Live-query boundary: documents, snapshot sinks and feed errors.

use crate::observability::events;
use crate::registry::teardown::Teardown;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const COMPONENT: &str = "snapshot_sink";

/// One record of a snapshot as delivered by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Failure categories reported by live feeds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedErrorCode {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Unavailable,
    Internal,
}

impl Display for FeedErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedErrorCode::InvalidArgument => "invalid_argument",
            FeedErrorCode::NotFound => "not_found",
            FeedErrorCode::PermissionDenied => "permission_denied",
            FeedErrorCode::Unavailable => "unavailable",
            FeedErrorCode::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Failure opening or running a live feed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeedError {
    code: FeedErrorCode,
    message: String,
}

impl FeedError {
    pub fn new(code: FeedErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::InvalidArgument, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Internal, message)
    }

    pub fn code(&self) -> FeedErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for FeedError {}

/// Latest state published on a key's channel.
#[derive(Clone, Debug)]
pub(crate) enum FeedSignal {
    /// A listener generation started and has not delivered yet.
    Pending,
    Snapshot(Arc<Vec<Document>>),
    Failed(FeedError),
}

/// A [`FeedSignal`] stamped with the listener generation that produced it.
///
/// Generation `0` is never assigned by the registry.
#[derive(Clone, Debug)]
pub(crate) struct ChannelSignal {
    pub(crate) generation: u64,
    pub(crate) signal: FeedSignal,
}

impl ChannelSignal {
    pub(crate) fn new(generation: u64, signal: FeedSignal) -> Self {
        Self { generation, signal }
    }

    /// Value of a channel no generation has published on yet.
    pub(crate) fn unclaimed() -> Self {
        Self::new(0, FeedSignal::Pending)
    }
}

/// Where one listener generation publishes snapshots and runtime failures.
///
/// The sink goes quiet once its generation is torn down, so a late callback from a
/// closed listener can never overwrite what a newer generation published.
#[derive(Clone)]
pub struct SnapshotSink {
    key: Arc<str>,
    generation: u64,
    sender: Arc<watch::Sender<ChannelSignal>>,
    closed: Arc<AtomicBool>,
}

impl SnapshotSink {
    pub(crate) fn new(
        key: &str,
        generation: u64,
        sender: Arc<watch::Sender<ChannelSignal>>,
    ) -> Self {
        Self {
            key: Arc::from(key),
            generation,
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Teardown that silences this sink.
    pub(crate) fn close_on_teardown(&self) -> Teardown {
        let closed = self.closed.clone();
        Teardown::new(move || closed.store(true, Ordering::Release))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Listener generation this sink publishes for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publishes a full snapshot. Returns `false` if the generation already ended.
    pub fn deliver(&self, documents: Vec<Document>) -> bool {
        self.publish(FeedSignal::Snapshot(Arc::new(documents)))
    }

    /// Reports a runtime failure of the listener. The generation stays registered.
    pub fn fail(&self, err: FeedError) -> bool {
        self.publish(FeedSignal::Failed(err))
    }

    fn publish(&self, signal: FeedSignal) -> bool {
        if self.is_closed() {
            debug!(
                event = events::FEED_SIGNAL_AFTER_TEARDOWN,
                component = COMPONENT,
                key = %self.key,
                generation = self.generation,
                "dropping signal from closed listener"
            );
            return false;
        }
        self.sender
            .send_replace(ChannelSignal::new(self.generation, signal));
        true
    }
}

impl Debug for SnapshotSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotSink")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The backend's "watch a query, get snapshots" primitive.
pub trait LiveQuery: Send + Sync {
    /// Starts a listener that publishes into `sink` until the returned teardown runs.
    fn watch(&self, sink: SnapshotSink) -> Result<Teardown, FeedError>;
}

impl<F> LiveQuery for F
where
    F: Fn(SnapshotSink) -> Result<Teardown, FeedError> + Send + Sync,
{
    fn watch(&self, sink: SnapshotSink) -> Result<Teardown, FeedError> {
        self(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelSignal, Document, FeedError, FeedErrorCode, FeedSignal, SnapshotSink};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::watch;

    #[test]
    fn sink_stops_publishing_after_teardown() {
        let (sender, receiver) = watch::channel(ChannelSignal::unclaimed());
        let sink = SnapshotSink::new("notifications:user1", 7, Arc::new(sender));

        assert!(sink.deliver(vec![Document::new("n1", json!({ "title": "hi" }))]));
        let latest = receiver.borrow().clone();
        assert_eq!(latest.generation, 7);
        assert!(matches!(latest.signal, FeedSignal::Snapshot(docs) if docs.len() == 1));

        sink.close_on_teardown().run();

        assert!(sink.is_closed());
        assert!(!sink.fail(FeedError::unavailable("late")));
        assert!(matches!(receiver.borrow().signal, FeedSignal::Snapshot(_)));
    }

    #[test]
    fn feed_error_display_includes_code() {
        let err = FeedError::permission_denied("missing read rule");
        assert_eq!(err.code(), FeedErrorCode::PermissionDenied);
        assert_eq!(err.to_string(), "permission_denied: missing read rule");
    }
}
