use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::indexing::{IndexingStatus, QueueEvent, QueueKind};
use crate::models::resource::Resource;
use crate::services::indexing_queue::IndexingQueue;
use crate::services::listing_cache::ListingCache;
use crate::services::tree_store::ResourceTreeStore;

const EVENT_BUFFER: usize = 256;

/// Everything one picker session shares between its callers and its queue
/// workers. Locks are only held for single state transitions, never across
/// a remote call.
pub struct SessionState<G> {
    pub gateway: G,
    pub listings: ListingCache,
    db: Mutex<rusqlite::Connection>,
    tree: Mutex<ResourceTreeStore>,
    queue: Mutex<IndexingQueue>,
    prefetched: Mutex<HashSet<String>>,
    expanding: Mutex<HashSet<String>>,
    targets: Mutex<HashMap<String, Resource>>,
    org_id: Mutex<Option<String>>,
    events: broadcast::Sender<QueueEvent>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<G> SessionState<G> {
    pub fn new(gateway: G, db: rusqlite::Connection, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            gateway,
            listings: ListingCache::new(config.dedupe_interval, config.cache_ttl),
            db: Mutex::new(db),
            tree: Mutex::new(ResourceTreeStore::new()),
            queue: Mutex::new(IndexingQueue::new()),
            prefetched: Mutex::new(HashSet::new()),
            expanding: Mutex::new(HashSet::new()),
            targets: Mutex::new(HashMap::new()),
            org_id: Mutex::new(config.org_id.clone()),
            events,
        }
    }

    pub fn tree(&self) -> MutexGuard<'_, ResourceTreeStore> {
        relock(&self.tree)
    }

    pub fn queue(&self) -> MutexGuard<'_, IndexingQueue> {
        relock(&self.queue)
    }

    pub fn db(&self) -> MutexGuard<'_, rusqlite::Connection> {
        relock(&self.db)
    }

    pub fn org_id(&self) -> Option<String> {
        relock(&self.org_id).clone()
    }

    pub fn set_org_id(&self, org_id: Option<&str>) {
        *relock(&self.org_id) = org_id.map(str::to_string);
    }

    /// Records a folder as prefetched; `false` if it already was.
    pub fn mark_prefetched(&self, folder_id: &str) -> bool {
        relock(&self.prefetched).insert(folder_id.to_string())
    }

    pub fn is_prefetched(&self, folder_id: &str) -> bool {
        relock(&self.prefetched).contains(folder_id)
    }

    pub fn unmark_prefetched<'a, I>(&self, folder_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut prefetched = relock(&self.prefetched);
        for id in folder_ids {
            prefetched.remove(id);
        }
    }

    pub fn clear_prefetched(&self) {
        relock(&self.prefetched).clear();
    }

    /// Records a user expansion waiting on its listing; `false` if one
    /// already is.
    pub fn begin_expansion(&self, folder_id: &str) -> bool {
        relock(&self.expanding).insert(folder_id.to_string())
    }

    /// Withdraws a pending expansion; `true` if one was pending.
    pub fn cancel_expansion(&self, folder_id: &str) -> bool {
        relock(&self.expanding).remove(folder_id)
    }

    pub fn clear_expansions(&self) {
        relock(&self.expanding).clear();
    }

    /// Keeps the resource a queued job refers to, so the job still resolves
    /// after the tree has navigated away from it.
    pub fn remember_target(&self, resource: Resource) {
        relock(&self.targets).insert(resource.resource_id.clone(), resource);
    }

    pub fn target(&self, resource_id: &str) -> Option<Resource> {
        relock(&self.targets).get(resource_id).cloned()
    }

    pub fn forget_target(&self, resource_id: &str) {
        relock(&self.targets).remove(resource_id);
    }

    pub fn clear_targets(&self) {
        relock(&self.targets).clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, resource_id: &str, queue: QueueKind, status: IndexingStatus) {
        // No receivers is fine.
        let _ = self.events.send(QueueEvent {
            resource_id: resource_id.to_string(),
            queue,
            status,
        });
    }
}
