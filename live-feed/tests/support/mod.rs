use live_feed::{Document, FeedError, LiveQuery, SnapshotSink, Teardown};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// `LiveQuery` fake that records every listener it opens.
#[allow(dead_code)]
#[derive(Default)]
pub(crate) struct RecordingQuery {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sinks: Mutex<Vec<SnapshotSink>>,
    initial: Mutex<Option<Vec<Document>>>,
    fail_with: Mutex<Option<FeedError>>,
}

#[allow(dead_code)]
impl RecordingQuery {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every new listener delivers `documents` before `watch` returns.
    pub(crate) fn with_initial(documents: Vec<Document>) -> Arc<Self> {
        let query = Self::default();
        *query.initial.lock().unwrap() = Some(documents);
        Arc::new(query)
    }

    pub(crate) fn fail_next_opens(&self, err: FeedError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn latest_sink(&self) -> SnapshotSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no listener has been opened")
    }
}

impl LiveQuery for RecordingQuery {
    fn watch(&self, sink: SnapshotSink) -> Result<Teardown, FeedError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(documents) = self.initial.lock().unwrap().clone() {
            sink.deliver(documents);
        }
        self.sinks.lock().unwrap().push(sink);
        let closes = self.closes.clone();
        Ok(Teardown::new(move || {
            closes.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[allow(dead_code)]
pub(crate) fn document(id: &str, data: serde_json::Value) -> Document {
    Document::new(id, data)
}

#[allow(dead_code)]
pub(crate) fn counting_open(
    opened: &Arc<AtomicUsize>,
    closed: &Arc<AtomicUsize>,
) -> impl FnOnce() -> Result<Teardown, FeedError> {
    let (opened, closed) = (opened.clone(), closed.clone());
    move || {
        opened.fetch_add(1, Ordering::SeqCst);
        Ok(Teardown::new(move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
