use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// Family rows behind one process-wide mutex. The mutex only guards map
/// consistency per call; serializing the read-modify-write across a whole
/// transaction is `MemoryTxManager`'s job.
#[derive(Default)]
pub struct MemoryTokenFamilyRepo {
    rows: Mutex<HashMap<UserId, TokenFamilyRecord>>,
}

impl MemoryTokenFamilyRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenFamilyRepo for MemoryTokenFamilyRepo {
    async fn find_by_user_for_update<'t>(
        &self,
        _tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
    ) -> Result<Option<TokenFamilyRecord>, TokenError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(rows.get(&user_id).cloned())
    }

    async fn insert_in_tx<'t>(
        &self,
        _tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        if rows.contains_key(&record.user_id) {
            return Err(TokenError::Store(format!(
                "token family already exists for user {}",
                record.user_id
            )));
        }
        rows.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn update_in_tx<'t>(
        &self,
        _tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        match rows.get_mut(&record.user_id) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(TokenError::UnknownFamily),
        }
    }
}
