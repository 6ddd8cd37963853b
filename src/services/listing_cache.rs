//! Dedupes folder listings by (connection, folder).
//!
//! Concurrent callers for the same key share one in-flight request. A
//! completed listing is reused for the dedupe window and forgotten after the
//! ttl. Failed requests leave nothing behind, so the next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;

use crate::error::AppError;
use crate::models::resource::Resource;

type ListingKey = (String, Option<String>);
pub type Listing = Arc<Vec<Resource>>;

struct Slot {
    cell: Arc<OnceCell<Listing>>,
    created_at: Instant,
}

pub struct ListingCache {
    slots: Mutex<HashMap<ListingKey, Slot>>,
    dedupe_interval: Duration,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(dedupe_interval: Duration, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            dedupe_interval,
            ttl: ttl.max(dedupe_interval),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ListingKey, Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(connection_id: &str, folder_id: Option<&str>) -> ListingKey {
        (connection_id.to_string(), folder_id.map(str::to_string))
    }

    /// Returns the cached listing, joins an in-flight one, or runs `fetch`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        connection_id: &str,
        folder_id: Option<&str>,
        fetch: F,
    ) -> Result<Listing, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Resource>, AppError>>,
    {
        let cell = {
            let mut slots = self.lock();
            let now = Instant::now();
            slots.retain(|_, slot| !slot.is_stale(now, self.ttl) && !slot.is_abandoned());

            let key = Self::key(connection_id, folder_id);
            let reusable = slots
                .get(&key)
                .filter(|slot| !slot.is_stale(now, self.dedupe_interval))
                .map(|slot| slot.cell.clone());
            match reusable {
                Some(cell) => cell,
                None => {
                    let cell = Arc::new(OnceCell::new());
                    slots.insert(
                        key,
                        Slot {
                            cell: cell.clone(),
                            created_at: now,
                        },
                    );
                    cell
                }
            }
        };

        let listing = cell
            .get_or_try_init(|| async move { fetch().await.map(Arc::new) })
            .await;
        match listing {
            Ok(listing) => Ok(listing.clone()),
            Err(err) => {
                self.evict_failed(connection_id, folder_id, &cell);
                Err(err)
            }
        }
    }

    /// Drops a slot whose fetch failed, unless a retry already filled it.
    fn evict_failed(
        &self,
        connection_id: &str,
        folder_id: Option<&str>,
        cell: &Arc<OnceCell<Listing>>,
    ) {
        let mut slots = self.lock();
        let key = Self::key(connection_id, folder_id);
        let failed = slots
            .get(&key)
            .is_some_and(|slot| Arc::ptr_eq(&slot.cell, cell) && !slot.cell.initialized());
        if failed {
            slots.remove(&key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock().len()
    }

    /// Cached listing without fetching.
    pub fn peek(&self, connection_id: &str, folder_id: Option<&str>) -> Option<Listing> {
        let slots = self.lock();
        let slot = slots.get(&Self::key(connection_id, folder_id))?;
        if slot.is_stale(Instant::now(), self.dedupe_interval) {
            return None;
        }
        slot.cell.get().cloned()
    }

    pub fn invalidate(&self, connection_id: &str, folder_id: Option<&str>) {
        self.lock().remove(&Self::key(connection_id, folder_id));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Slot {
    /// Never filled and no caller still waiting on it, e.g. a dropped fetch.
    fn is_abandoned(&self) -> bool {
        !self.cell.initialized() && Arc::strong_count(&self.cell) == 1
    }

    /// In-flight slots never go stale.
    fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        self.cell.initialized() && now.duration_since(self.created_at) > max_age
    }
}
