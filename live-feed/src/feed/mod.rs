//! Live feed layer.
//!
//! A [`LiveFeed`](live_feed::LiveFeed) binds one consumer to a key. Feeds of the same
//! key share a snapshot channel in the [`FeedHub`](hub::FeedHub), which also owns the
//! key's single reconnect callback.

pub(crate) mod hub;
pub(crate) mod live_feed;
pub(crate) mod query;
