use crate::domain_port::{StorageTx, TxManager};
use anyhow::anyhow;
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};

/// Transaction scope backing the family-row read-modify-write. Dropping
/// the boxed transaction without commit rolls it back, which is what the
/// engine relies on for its error paths.
pub struct MySqlTxManager {
    pool: MySqlPool,
}

impl MySqlTxManager {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTxManager { pool }
    }
}

#[async_trait::async_trait]
impl TxManager for MySqlTxManager {
    async fn begin<'t>(&'t self) -> anyhow::Result<Box<dyn StorageTx<'t> + 't>> {
        let tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        Ok(Box::new(MySqlTx { inner: tx }))
    }
}

pub struct MySqlTx<'t> {
    inner: Transaction<'t, MySql>,
}

impl<'t> MySqlTx<'t> {
    /// Recover the concrete transaction behind the `StorageTx` seam. The
    /// MySQL repos only ever receive transactions minted by
    /// [`MySqlTxManager`], so the cast cannot observe another concrete
    /// type in this wiring.
    pub fn from_dyn<'a>(tx: &'a mut dyn StorageTx<'t>) -> &'a mut MySqlTx<'t> {
        unsafe {
            let p = tx as *mut dyn StorageTx<'t>;
            &mut *(p as *mut MySqlTx<'t>)
        }
    }

    pub fn conn(&mut self) -> &mut MySqlConnection {
        self.inner.as_mut()
    }
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MySqlTx<'t> {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.commit().await.map_err(|e| anyhow!(e))
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.rollback().await.map_err(|e| anyhow!(e))
    }
}
