//! Canonical structured event names used across `live-feed`.

// Registry events.
pub const SUBSCRIPTION_OPEN_START: &str = "subscription_open_start";
pub const SUBSCRIPTION_OPEN_OK: &str = "subscription_open_ok";
pub const SUBSCRIPTION_OPEN_FAILED: &str = "subscription_open_failed";
pub const SUBSCRIPTION_OPEN_ABANDONED: &str = "subscription_open_abandoned";
pub const SUBSCRIPTION_REUSE: &str = "subscription_reuse";
pub const SUBSCRIPTION_RELEASE: &str = "subscription_release";
pub const SUBSCRIPTION_RELEASE_STALE: &str = "subscription_release_stale";
pub const SUBSCRIPTION_TEARDOWN: &str = "subscription_teardown";
pub const SUBSCRIPTION_TEARDOWN_PANICKED: &str = "subscription_teardown_panicked";
pub const SUBSCRIPTION_FORCE_REMOVE: &str = "subscription_force_remove";
pub const SUBSCRIPTION_FORCE_REMOVE_MISSING: &str = "subscription_force_remove_missing";
pub const SUBSCRIPTION_REJECT_EMPTY_KEY: &str = "subscription_reject_empty_key";
pub const SUBSCRIPTION_UNSUBSCRIBE_ALL: &str = "subscription_unsubscribe_all";

// Network tracker events.
pub const NETWORK_DISCONNECT: &str = "network_disconnect";
pub const NETWORK_RECONNECT: &str = "network_reconnect";
pub const NETWORK_TRANSITION_IGNORED: &str = "network_transition_ignored";
pub const RECONNECT_CALLBACK_REGISTER: &str = "reconnect_callback_register";
pub const RECONNECT_CALLBACK_REPLACE: &str = "reconnect_callback_replace";
pub const RECONNECT_CALLBACK_UNREGISTER: &str = "reconnect_callback_unregister";
pub const RECONNECT_CALLBACK_PANICKED: &str = "reconnect_callback_panicked";
pub const CONNECTIVITY_STREAM_CLOSED: &str = "connectivity_stream_closed";

// Feed binding events.
pub const FEED_MOUNT: &str = "feed_mount";
pub const FEED_UNMOUNT: &str = "feed_unmount";
pub const FEED_OPEN_FAILED: &str = "feed_open_failed";
pub const FEED_RECONNECT: &str = "feed_reconnect";
pub const FEED_SNAPSHOT: &str = "feed_snapshot";
pub const FEED_ITEM_SKIPPED: &str = "feed_item_skipped";
pub const FEED_RUNTIME_ERROR: &str = "feed_runtime_error";
pub const FEED_SIGNAL_AFTER_TEARDOWN: &str = "feed_signal_after_teardown";
pub const FEED_SIGNAL_FOREIGN_GENERATION: &str = "feed_signal_foreign_generation";
pub const FEED_CHANNEL_PRUNED: &str = "feed_channel_pruned";

// Manager lifecycle events.
pub const MANAGER_CREATE: &str = "manager_create";
pub const MANAGER_RESET: &str = "manager_reset";
