use crate::domain_model::{FamilyId, Provider, TokenId, TokenKind, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload of a signed token. The required fields are closed; anything else
/// a token carries lands in the `extra` map so extension claims survive a
/// decode/re-sign cycle without this struct having to know about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Login/email of the principal. Two tokens are linked iff their
    /// subjects are equal.
    pub sub: String,
    pub user_id: UserId,
    /// Identifier of this individual token; revocation-list key.
    pub jwt_id: TokenId,
    pub family_id: FamilyId,
    #[serde(rename = "tokenType")]
    pub token_kind: TokenKind,
    pub provider: Provider,
    /// Absolute expiry, unix seconds.
    pub exp: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A freshly signed access/refresh pair, as returned to the ingress layer.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}
