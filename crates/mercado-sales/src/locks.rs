//! # Keyed Locks
//!
//! Serializes sale operations that touch the same sale or product.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  acquire(["product:b", "product:a", "product:a"])                       │
//! │     sort + dedup ──► ["product:a", "product:b"]                         │
//! │     lock in that order ──► LockGuard (released on drop)                 │
//! │                                                                         │
//! │  Two operations over overlapping products always lock the shared keys  │
//! │  in the same order, so they cannot deadlock each other.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub fn sale_key(id: &str) -> String {
    format!("sale:{id}")
}

pub fn product_key(id: &str) -> String {
    format!("product:{id}")
}

/// Lock table keyed by string.
#[derive(Debug, Default)]
pub struct LockSet {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds every lock of one `acquire` call until dropped.
#[derive(Debug)]
pub struct LockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<I>(&self, keys: I) -> LockGuard
    where
        I: IntoIterator<Item = String>,
    {
        let mut keys: Vec<String> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only the table itself references are idle
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            keys.iter()
                .map(|key| table.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        LockGuard { _guards: guards }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(LockSet::new());
        let guard = locks.acquire([product_key("a")]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire([product_key("a")]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = LockSet::new();
        let _a = locks.acquire([product_key("a")]).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire([product_key("b")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_keys_lock_once() {
        let locks = LockSet::new();
        let _g = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire([product_key("a"), product_key("a")]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = LockSet::new();
        drop(locks.acquire([sale_key("s"), product_key("a")]).await);
        let _g = locks.acquire([product_key("b")]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
