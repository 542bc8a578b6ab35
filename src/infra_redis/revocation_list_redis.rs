use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::BTreeMap;

/// Revocation entries as redis hashes: one hash per denylisted token id,
/// field = claim key, value = pending remediation action. Entries are
/// written by the account-lifecycle side; this adapter only reads and
/// clears them.
pub struct RedisRevocationList {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRevocationList {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationList {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, jwt_id: TokenId) -> String {
        format!("{}:{}", self.prefix, jwt_id)
    }
}

#[async_trait::async_trait]
impl RevocationList for RedisRevocationList {
    async fn is_revoked(&self, jwt_id: TokenId) -> Result<bool, TokenError> {
        let key = self.key(jwt_id);
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(exists)
    }

    async fn pending_actions(
        &self,
        jwt_id: TokenId,
    ) -> Result<BTreeMap<String, RevocationAction>, TokenError> {
        let key = self.key(jwt_id);
        let mut conn = self.conn.clone();
        let raw: BTreeMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let mut actions = BTreeMap::new();
        for (claim_key, action) in raw {
            let action: RevocationAction = action.parse().map_err(TokenError::Store)?;
            actions.insert(claim_key, action);
        }
        Ok(actions)
    }

    async fn clear(&self, jwt_id: TokenId) -> Result<(), TokenError> {
        let key = self.key(jwt_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(())
    }
}
