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

mod support;

use chrono::NaiveDate;
use live_feed::{FeedError, FeedKey, FeedOptions, FeedStatus, RealtimeConfig, RealtimeManager};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use support::{document, RecordingQuery};

#[derive(Debug, Deserialize, PartialEq)]
struct WorkStatus {
    id: String,
    status: String,
}

fn manager() -> RealtimeManager {
    let _ = tracing_subscriber::fmt::try_init();
    RealtimeManager::new(RealtimeConfig {
        name: "fanout-test".to_string(),
        debug: true,
    })
}

#[test]
fn two_feeds_on_one_key_both_receive_data() {
    let manager = manager();
    let query = RecordingQuery::new();
    let key = FeedKey::today_work_status("staff7", NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());

    let first = manager.feed(FeedOptions::<WorkStatus>::deserialized(&key, query.clone()));
    let second = manager.feed(FeedOptions::<WorkStatus>::deserialized(&key, query.clone()));
    assert_eq!(query.opens(), 1);
    assert_eq!(manager.feed_count(&key.as_key()), 2);

    query.latest_sink().deliver(vec![
        document("w1", json!({ "status": "checked_in" })),
        document("w2", json!({ "status": 42 })),
    ]);

    let expected = [WorkStatus {
        id: "w1".to_string(),
        status: "checked_in".to_string(),
    }];
    assert_eq!(first.view().items(), &expected);
    assert_eq!(second.view().items(), &expected);
    assert!(first.view().error.is_none());
}

#[test]
fn outage_recovery_reopens_each_key_once_and_keeps_data_visible() {
    let manager = manager();
    let notifications = RecordingQuery::with_initial(vec![document("n1", json!({}))]);
    let schedules = RecordingQuery::with_initial(vec![document("s1", json!({}))]);
    let parse_id = |doc: &live_feed::Document| Some(doc.id.clone());

    let feeds = vec![
        manager.feed(FeedOptions::new("notifications:u1", notifications.clone(), parse_id)),
        manager.feed(FeedOptions::new("notifications:u1", notifications.clone(), parse_id)),
        manager.feed(FeedOptions::new("schedules:u1", schedules.clone(), parse_id)),
    ];
    for feed in &feeds {
        assert_eq!(feed.status(), FeedStatus::Ready);
    }

    assert!(manager.on_network_disconnect());
    assert!(manager.on_network_reconnect());

    assert_eq!(notifications.opens(), 2);
    assert_eq!(notifications.closes(), 1);
    assert_eq!(schedules.opens(), 2);
    assert_eq!(manager.ref_count("notifications:u1"), 2);
    for feed in &feeds {
        let view = feed.view();
        assert_eq!(view.status(), FeedStatus::Ready);
        assert_eq!(view.items().len(), 1);
    }

    drop(feeds);
    assert_eq!(notifications.closes(), 2);
    assert_eq!(schedules.closes(), 2);
    assert_eq!(manager.stats().active_count, 0);
    assert_eq!(manager.network().callback_count(), 0);
}

#[test]
fn failed_open_leaves_key_free_for_next_mount() {
    let manager = manager();
    let query = RecordingQuery::new();
    query.fail_next_opens(FeedError::unavailable("offline"));

    let feed = manager.feed(FeedOptions::new("job_posting:p1", query.clone(), |doc| {
        Some(doc.id.clone())
    }));
    assert_eq!(feed.status(), FeedStatus::Failed);
    assert!(!manager.is_active("job_posting:p1"));

    let healthy = RecordingQuery::with_initial(vec![document("p1", json!({}))]);
    drop(feed);
    let feed = manager.feed(FeedOptions::new("job_posting:p1", healthy.clone(), |doc| {
        Some(doc.id.clone())
    }));
    assert_eq!(feed.status(), FeedStatus::Ready);
    assert_eq!(healthy.opens(), 1);
}

#[test]
fn force_remove_stops_the_feed_without_reopening() {
    let manager = manager();
    let query = RecordingQuery::with_initial(vec![document("n1", json!({}))]);
    let feed = manager.feed(FeedOptions::new("notifications:u1", query.clone(), |doc| {
        Some(doc.id.clone())
    }));

    assert!(manager.force_remove("notifications:u1"));
    assert_eq!(query.closes(), 1);
    assert!(!query.latest_sink().deliver(vec![]));

    let view = feed.view();
    assert_eq!(view.items().len(), 1);
    assert_eq!(query.opens(), 1);

    drop(feed);
    assert_eq!(query.closes(), 1);
}

#[tokio::test]
async fn changed_follows_live_updates() {
    let manager = manager();
    let query = RecordingQuery::new();
    let feed = manager.feed(FeedOptions::new("unread_count:u1", query.clone(), |doc| {
        doc.data.get("count").and_then(serde_json::Value::as_u64)
    }));
    let _ = feed.view();

    let sink = query.latest_sink();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        sink.deliver(vec![document("c", json!({ "count": 3 }))]);
    });

    let woke = tokio::time::timeout(Duration::from_secs(5), feed.changed())
        .await
        .expect("feed should observe the snapshot");
    assert!(woke);
    assert_eq!(feed.view().items(), &[3u64]);
}
