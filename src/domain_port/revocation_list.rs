use crate::application_port::*;
use crate::domain_model::*;
use std::collections::BTreeMap;

/// Denylist of token ids, owned by an external collaborator. The engine
/// only reads and clears entries, never creates them.
#[async_trait::async_trait]
pub trait RevocationList: Send + Sync {
    async fn is_revoked(&self, jwt_id: TokenId) -> Result<bool, TokenError>;

    /// Remediation actions pending for a revoked id, keyed by claim key.
    async fn pending_actions(
        &self,
        jwt_id: TokenId,
    ) -> Result<BTreeMap<String, RevocationAction>, TokenError>;

    async fn clear(&self, jwt_id: TokenId) -> Result<(), TokenError>;
}
