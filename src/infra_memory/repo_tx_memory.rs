use crate::domain_port::{StorageTx, TxManager};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Transaction scope for the in-memory adapters. The store-level lock is
/// held for the whole life of the transaction, so a family
/// read-modify-write serializes the way the MySQL adapter's `FOR UPDATE`
/// row lock does: a second `begin` blocks until the first transaction
/// commits, rolls back, or drops.
#[derive(Default)]
pub struct MemoryTxManager {
    lock: Arc<Mutex<()>>,
}

impl MemoryTxManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TxManager for MemoryTxManager {
    async fn begin<'t>(&'t self) -> anyhow::Result<Box<dyn StorageTx<'t> + 't>> {
        let guard = self.lock.clone().lock_owned().await;
        Ok(Box::new(MemoryTx { _guard: guard }))
    }
}

pub struct MemoryTx {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MemoryTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
