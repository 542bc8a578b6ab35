use crate::domain_model::*;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature or expired. Soft failure on the validation hot path,
    /// surfaced as 401 at the boundary and never retried automatically.
    #[error("token is not valid")]
    InvalidToken,
    #[error("token kind mismatch: provided {actual} but expected {expected}")]
    KindMismatch {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("tokens are not linked to each other")]
    UnlinkedTokens,
    #[error("refresh token was already used, it can be exchanged only once")]
    ReusedRefreshToken,
    #[error("too many refresh requests")]
    Throttled,
    #[error("principal from token subject not found")]
    UnknownPrincipal,
    #[error("no token family linked to principal")]
    UnknownFamily,
    /// Signing or signature failure outside the soft validation path. This
    /// is configuration-class or tampering, never user-attributable.
    #[error("signing error: {0}")]
    Signing(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Outcome of a revocation-list lookup for one `jwtId`.
#[derive(Debug, Clone, PartialEq)]
pub enum RevocationStatus {
    Clear,
    /// The token id is denylisted. `actions` maps claim keys to the
    /// remediation step pending for each; the entry has already been
    /// cleared by the time the caller sees this.
    Revoked {
        actions: BTreeMap<String, RevocationAction>,
    },
}

/// The token lifecycle engine. The only component allowed to touch the
/// token-family store.
#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Create or roll the principal's token family and sign a fresh pair.
    async fn issue(&self, principal: &PrincipalView) -> Result<TokenPair, TokenError>;

    /// Exchange a still-unused refresh token (plus its linked access token)
    /// for a new pair, rotating the family record.
    async fn refresh(
        &self,
        presented_access: &str,
        presented_refresh: &str,
    ) -> Result<TokenPair, TokenError>;

    /// Per-request validation. `Ok(None)` means reject with 401; a kind
    /// mismatch is a distinct client error, not a soft rejection.
    async fn validate(
        &self,
        token: &str,
        expected_kind: TokenKind,
    ) -> Result<Option<Claims>, TokenError>;

    /// Ask the revocation list about a token id, clearing the entry after
    /// one inspection when present.
    async fn check_revocation(&self, jwt_id: TokenId) -> Result<RevocationStatus, TokenError>;

    /// Decode-then-resign: merge `new_claims` into the token's extension
    /// map, preserving subject and expiry. No store interaction.
    async fn with_updated_claims(
        &self,
        new_claims: BTreeMap<String, serde_json::Value>,
        token: &str,
    ) -> Result<String, TokenError>;

    /// Decode-then-resign: drop `keys` from the token's extension map,
    /// preserving subject and expiry. No store interaction.
    async fn with_removed_claims(&self, keys: &[String], token: &str)
    -> Result<String, TokenError>;
}

/// The slice of a principal the engine needs for issuance. The full record
/// (credentials and so on) stays behind the principal directory port.
#[derive(Debug, Clone)]
pub struct PrincipalView {
    pub user_id: UserId,
    pub subject: String,
    pub provider: Provider,
}
