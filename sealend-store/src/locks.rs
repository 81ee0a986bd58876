//! Per-record transition locks.
//!
//! Every transition locks the keys it reads or writes before loading them
//! and holds the locks until commit or abort. Transitions on disjoint keys
//! never wait on each other.
//!
//! Keys are always acquired in sorted order, so two transitions sharing
//! several keys cannot deadlock.
//!
//! A key's entry lives only while some guard holds it or some transition
//! waits on it. Locking keys of records that never come to exist leaves
//! nothing behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sealend_domain::Address;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use crate::error::StoreError;

type LockTable = Arc<Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>>;

/// Table of per-key mutexes
#[derive(Debug, Default)]
pub struct RecordLocks {
    table: LockTable,
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct RecordLockGuard {
    keys: Vec<Address>,
    guards: Vec<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl RecordLockGuard {
    /// Keys held, sorted
    pub fn keys(&self) -> &[Address] {
        &self.keys
    }
}

impl Drop for RecordLockGuard {
    fn drop(&mut self) {
        self.guards.clear();

        // Entries are cloned only under the table lock, so a count of one
        // means no other guard or waiter refers to the mutex.
        let Ok(mut table) = self.table.lock() else {
            return;
        };
        for key in &self.keys {
            if matches!(table.get(key), Some(mutex) if Arc::strong_count(mutex) == 1) {
                table.remove(key);
            }
        }
    }
}

impl RecordLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in `keys`, waiting on any held by another transition
    pub async fn acquire(&self, keys: &[Address]) -> Result<RecordLockGuard, StoreError> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self
                .table
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("record lock table: {}", e)))?;
            keys.iter().map(|key| table.entry(*key).or_default().clone()).collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        trace!(count = keys.len(), "Record locks acquired");
        Ok(RecordLockGuard { keys, guards, table: self.table.clone() })
    }

    /// Number of keys currently held or awaited
    pub fn tracked_keys(&self) -> usize {
        self.table.lock().map(|table| table.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(RecordLocks::new());
        let key = Address::from_label("reserve");

        let held = locks.acquire(&[key]).await.unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&[key]).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_wait() {
        let locks = RecordLocks::new();
        let _a = locks.acquire(&[Address::from_label("a")]).await.unwrap();

        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&[Address::from_label("b")]),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_keys_sorted_and_deduplicated() {
        let locks = RecordLocks::new();
        let a = Address::new([1; 32]);
        let b = Address::new([2; 32]);

        let guard = locks.acquire(&[b, a, b]).await.unwrap();
        assert_eq!(guard.keys(), &[a, b]);
        assert_eq!(locks.tracked_keys(), 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_forgotten() {
        let locks = RecordLocks::new();

        for i in 0..100u8 {
            let keys = [Address::new([i; 32]), Address::from_label("shared")];
            let _guard = locks.acquire(&keys).await.unwrap();
        }
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_awaited_key_survives_release() {
        let locks = Arc::new(RecordLocks::new());
        let key = Address::from_label("reserve");
        let held = locks.acquire(&[key]).await.unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let guard = locks.acquire(&[key]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                drop(guard);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        // the contender still refers to the entry
        assert_eq!(locks.tracked_keys(), 1);

        contender.await.unwrap();
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_sets_do_not_deadlock() {
        let locks = Arc::new(RecordLocks::new());
        let a = Address::from_label("a");
        let b = Address::from_label("b");

        let mut handles = Vec::new();
        for i in 0..16 {
            let locks = locks.clone();
            let keys = if i % 2 == 0 { vec![a, b] } else { vec![b, a] };
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&keys).await.unwrap();
                tokio::task::yield_now().await;
            }));
        }

        let all = futures_join(handles);
        tokio::time::timeout(Duration::from_secs(5), all).await.expect("no deadlock");
    }

    async fn futures_join(handles: Vec<tokio::task::JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
