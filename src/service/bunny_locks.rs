//! Keyed async mutexes serializing work on individual bunnies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::BunnyId;

/// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per bunny, created on first use.
///
/// Work on the same bunny is serialized; work on different bunnies is not.
/// Multi-bunny acquisition always locks in ascending id order, so two plays
/// between the same pair cannot deadlock.
#[derive(Debug, Default)]
pub struct BunnyLocks {
    table: Mutex<HashMap<BunnyId, Arc<Mutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct BunnyGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl BunnyLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every bunny in `ids`, in ascending id order, skipping duplicates.
    pub async fn acquire(&self, ids: &[BunnyId]) -> BunnyGuard {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().await;
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, m| Arc::strong_count(m) > 1);
            }
            ordered
                .iter()
                .map(|id| Arc::clone(table.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        BunnyGuard { _guards: guards }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_bunny_is_serialized() {
        let locks = Arc::new(BunnyLocks::new());
        let id = BunnyId::new();
        let guard = locks.acquire(&[id]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(&[id]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        assert!(contender.await.is_ok());
    }

    #[tokio::test]
    async fn different_bunnies_do_not_block() {
        let locks = BunnyLocks::new();
        let _a = locks.acquire(&[BunnyId::new()]).await;
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&[BunnyId::new()]),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn opposite_pair_orders_do_not_deadlock() {
        let locks = Arc::new(BunnyLocks::new());
        let a = BunnyId::new();
        let b = BunnyId::new();

        let mut handles = Vec::new();
        for i in 0..50 {
            let locks = Arc::clone(&locks);
            let pair = if i % 2 == 0 { [a, b] } else { [b, a] };
            handles.push(tokio::spawn(async move {
                let _g = locks.acquire(&pair).await;
                tokio::task::yield_now().await;
            }));
        }
        let all = tokio::time::timeout(Duration::from_secs(5), async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
        assert!(all.is_ok());
    }

    #[tokio::test]
    async fn duplicate_ids_lock_once() {
        let locks = BunnyLocks::new();
        let id = BunnyId::new();
        let acquired =
            tokio::time::timeout(Duration::from_millis(100), locks.acquire(&[id, id])).await;
        assert!(acquired.is_ok());
    }
}
