use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per address. Holding the guard serialises every pipeline that
/// spends from that address.
#[derive(Debug, Clone, Default)]
pub struct AddressLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Entries nobody holds or waits on are dropped.
            map.retain(|key, lock| key == address || Arc::strong_count(lock) > 1);
            map.entry(address.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
