/* 📖 # How the child index stays consistent

The index is an immutable `BTreeMap` behind an `Arc`. Readers clone the `Arc` under a
short read lock and then work on a snapshot that never changes underneath them. A rebuild
lists the directory from scratch, builds a complete new map and swaps it in with one
write, so a reader sees either the old mapping or the new one.

Rebuilds are serialized by `rebuild_lock`. Each rebuild lists only after acquiring it, so
a listing taken earlier can never overwrite one taken later. The initial scan runs under
the same lock, which makes a notification that arrives while the first listing is in
flight wait for it and then rebuild on top of it.
*/

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use sysobj_base::WatchSubscription;

use crate::entry::Entry;

/// Child name to handle, ordered by name.
pub type ChildMap = BTreeMap<String, Entry>;

#[derive(Debug, Default)]
pub(crate) struct ChildIndex {
    snapshot: RwLock<Option<Arc<ChildMap>>>,
    rebuild_lock: Mutex<()>,
    subscription: Mutex<Option<WatchSubscription>>,
}

impl ChildIndex {
    /// The current mapping, or `None` if the directory was never indexed.
    pub fn snapshot(&self) -> Option<Arc<ChildMap>> {
        self.snapshot.read().clone()
    }

    pub fn is_indexed(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Serialize a scan or rebuild.
    pub fn lock_rebuild(&self) -> MutexGuard<'_, ()> {
        self.rebuild_lock.lock()
    }

    pub fn install(&self, map: ChildMap) -> Arc<ChildMap> {
        let map = Arc::new(map);
        *self.snapshot.write() = Some(map.clone());
        map
    }

    pub fn set_subscription(&self, subscription: WatchSubscription) {
        *self.subscription.lock() = Some(subscription);
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Drop the mapping and unsubscribe.
    ///
    /// The subscription is dropped after the rebuild lock is released, since a watcher
    /// thread may be waiting on that lock.
    pub fn release(&self) {
        let subscription = {
            let _rebuild = self.rebuild_lock.lock();
            *self.snapshot.write() = None;
            self.subscription.lock().take()
        };
        drop(subscription);
    }
}
