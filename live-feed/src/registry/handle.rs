//! Caller-owned subscription handles.

use crate::registry::subscription_registry::RegistryInner;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// One consumer's reference to a registry subscription.
///
/// Releasing decrements the shared ref count exactly once, no matter how many times
/// [`release`](Self::release) is called. The handle remembers the generation it joined,
/// so releasing it after that generation was force-removed never touches a newer
/// generation of the same key. Dropping an unreleased handle releases it.
#[must_use = "dropping a SubscriptionHandle releases the subscription immediately"]
pub struct SubscriptionHandle {
    registry: Weak<RegistryInner>,
    key: String,
    generation: u64,
    released: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(registry: &Arc<RegistryInner>, key: String, generation: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            key,
            generation,
            released: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Listener generation this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Releases this handle. Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        if !self.mark_released() {
            return false;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.release_generation(&self.key, self.generation);
        }
        true
    }

    /// Flips the handle to released without touching the registry.
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("released", &self.is_released())
            .finish()
    }
}
