// src/common/locks.rs
//! Per-user serialization of read-modify-write on the JSON set columns.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Keyed async mutexes, one per user id.
///
/// Saved/completed toggles and the itinerary delete sweep both hold the
/// user's guard while they read, modify and write that user's arrays.
#[derive(Clone, Default)]
pub struct RelationLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl RelationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            if map.len() >= PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            map.entry(user_id).or_default().clone()
        };
        entry.lock_owned().await
    }
}
