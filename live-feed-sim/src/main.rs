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

mod scenario;

use crate::scenario::{Scenario, SimError};
use clap::Parser;
use live_feed::{
    Document, FeedError, FeedOptions, LiveFeed, LiveQuery, RealtimeManager, SnapshotSink,
    Teardown,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command()]
struct SimArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

/// In-memory stand-in for a backend query: every listener starts with the current
/// documents, and `publish` replaces them and pushes them to every open listener.
struct StaticQuery {
    documents: Mutex<Vec<Document>>,
    sinks: Mutex<Vec<SnapshotSink>>,
    opens: AtomicUsize,
}

impl StaticQuery {
    fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            sinks: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
        }
    }

    fn publish(&self, documents: &[Document]) -> usize {
        *self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = documents.to_vec();
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        sinks.retain(|sink| !sink.is_closed());
        sinks
            .iter()
            .filter(|sink| sink.deliver(documents.to_vec()))
            .count()
    }
}

impl LiveQuery for StaticQuery {
    fn watch(&self, sink: SnapshotSink) -> Result<Teardown, FeedError> {
        let opens = self.opens.fetch_add(1, Ordering::Relaxed) + 1;
        info!(key = sink.key(), opens, "backend listener opened");
        let current = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        sink.deliver(current);
        let key = sink.key().to_string();
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        Ok(Teardown::new(move || {
            info!(key = %key, "backend listener closed");
        }))
    }
}

struct MountedFeed {
    key: String,
    query: Arc<StaticQuery>,
    updates: Vec<Vec<Document>>,
    consumers: Vec<LiveFeed<Document>>,
}

fn report(phase: &str, manager: &RealtimeManager, feeds: &[MountedFeed]) -> Result<(), SimError> {
    let stats = serde_json::to_string(&manager.stats())?;
    info!(phase, network = ?manager.network_state(), stats = %stats, "registry snapshot");
    for feed in feeds {
        for (index, consumer) in feed.consumers.iter().enumerate() {
            let view = consumer.view();
            let ids: Vec<&str> = view.items().iter().map(|doc| doc.id.as_str()).collect();
            info!(
                phase,
                key = %feed.key,
                consumer = index,
                status = ?view.status(),
                items = ?ids,
                "consumer view"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SimError> {
    let _ = tracing_subscriber::fmt::try_init();

    info!("Started live-feed-sim");

    let args = SimArgs::parse();
    let scenario = Scenario::from_file(&args.config)?;
    let manager = RealtimeManager::new(scenario.realtime.clone());

    let mut feeds = Vec::new();
    for spec in scenario.feeds {
        let key = spec.key.as_key();
        let query = Arc::new(StaticQuery::new(spec.documents));
        let consumers = (0..spec.consumers)
            .map(|_| {
                let options: FeedOptions<Document> =
                    FeedOptions::new(&key, query.clone(), |doc| Some(doc.clone()));
                manager.feed(options)
            })
            .collect();
        feeds.push(MountedFeed {
            key,
            query,
            updates: spec.updates,
            consumers,
        });
    }
    report("mounted", &manager, &feeds)?;

    let interval = Duration::from_millis(scenario.update_interval_ms);
    let rounds = feeds.iter().map(|feed| feed.updates.len()).max().unwrap_or(0);
    for round in 0..rounds {
        tokio::time::sleep(interval).await;
        for feed in &feeds {
            if let Some(update) = feed.updates.get(round) {
                let delivered = feed.query.publish(update);
                info!(key = %feed.key, round, delivered, "pushed update");
            }
        }
        for feed in &feeds {
            if let Some(consumer) = feed.consumers.first() {
                if feed.updates.get(round).is_some() {
                    consumer.changed().await;
                }
            }
        }
        report("updated", &manager, &feeds)?;
    }

    if scenario.simulate_outage {
        let transitions = futures::stream::iter([false, true]);
        manager.network().follow_connectivity(transitions).await;
        for feed in &feeds {
            info!(
                key = %feed.key,
                opens = feed.query.opens.load(Ordering::Relaxed),
                "listener opens after outage"
            );
        }
        report("recovered", &manager, &feeds)?;
    }

    drop(feeds);
    report("unmounted", &manager, &[])?;

    Ok(())
}
