use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-process revocation list. The engine only reads and clears entries;
/// `revoke` exists for the collaborator side of the contract (and for
/// tests standing in for it).
#[derive(Default)]
pub struct MemoryRevocationList {
    entries: Mutex<HashMap<TokenId, BTreeMap<String, RevocationAction>>>,
}

impl MemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jwt_id: TokenId, actions: BTreeMap<String, RevocationAction>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(jwt_id, actions);
        }
    }
}

#[async_trait::async_trait]
impl RevocationList for MemoryRevocationList {
    async fn is_revoked(&self, jwt_id: TokenId) -> Result<bool, TokenError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(entries.contains_key(&jwt_id))
    }

    async fn pending_actions(
        &self,
        jwt_id: TokenId,
    ) -> Result<BTreeMap<String, RevocationAction>, TokenError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(entries.get(&jwt_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, jwt_id: TokenId) -> Result<(), TokenError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        entries.remove(&jwt_id);
        Ok(())
    }
}
