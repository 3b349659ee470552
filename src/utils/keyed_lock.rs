//! Locks por clave
//!
//! Un mutex async por clave (vehículo, matrícula). La entrada del mapa se
//! elimina cuando el último guard o waiter de esa clave la suelta, así que el
//! mapa solo contiene las claves en uso.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

pub struct KeyedLocks<K: Eq + Hash> {
    locks: LockMap<K>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;

        KeyedGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Claves con un guard o un waiter vivo
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct KeyedGuard<K: Eq + Hash> {
    key: K,
    locks: LockMap<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Solo el mapa la referencia: nadie la tiene ni la espera
        if locks.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_is_pruned_after_release() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("KL07AB1234".to_string()).await;
            let _b = locks.lock("KL07AB1235".to_string()).await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock(1u32).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(1u32).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _held = locks.lock(1u32).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(2u32)).await;
        assert!(other.is_ok());
    }
}
