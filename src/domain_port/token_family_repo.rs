use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;
use chrono::{DateTime, Utc};

/// One row per principal. Created on first issuance, mutated in place on
/// every rotation, never deleted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenFamilyRecord {
    pub family_id: FamilyId,
    pub user_id: UserId,
    pub access_token_id: TokenId,
    pub refresh_token_id: TokenId,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    /// Last rotation instant. Audit field and minimum-interval throttle.
    pub updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenFamilyRepo: Send + Sync {
    /// Fetch with the row locked for the duration of the transaction, so
    /// concurrent rotations for one principal serialize.
    async fn find_by_user_for_update<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
    ) -> Result<Option<TokenFamilyRecord>, TokenError>;

    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError>;

    /// Overwrite token ids, expiries and `updated_at` for an existing
    /// family, keyed by `family_id`.
    async fn update_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError>;
}
