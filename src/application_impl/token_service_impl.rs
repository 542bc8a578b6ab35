use crate::application_impl::TokenSigner;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Claim keys owned by the closed part of [`Claims`]. The claim-editing
/// helpers refuse to let extension entries shadow these, which would
/// otherwise produce duplicate keys in the flattened payload.
const RESERVED_CLAIM_KEYS: [&str; 7] = [
    "sub",
    "userId",
    "jwtId",
    "familyId",
    "tokenType",
    "provider",
    "exp",
];

#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Rotations closer together than this are collapsed into one; the
    /// second caller gets a throttle error instead of a second pair.
    pub refresh_min_interval: Duration,
    /// When set, a successful rotation also regenerates the stored
    /// `refresh_token_id`, so a replayed refresh token fails on the id as
    /// well as on expiry drift.
    pub rotate_refresh_id: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        TokenPolicy {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            refresh_min_interval: Duration::seconds(5),
            rotate_refresh_id: false,
        }
    }
}

/// The token lifecycle engine: one family row per principal, signed pairs
/// out, rotation with reuse detection in between.
pub struct JwtTokenService {
    signer: TokenSigner,
    family_repo: Arc<dyn TokenFamilyRepo>,
    principal_repo: Arc<dyn PrincipalRepo>,
    revocation_list: Arc<dyn RevocationList>,
    tx_manager: Arc<dyn TxManager>,
    policy: TokenPolicy,
}

impl JwtTokenService {
    pub fn new(
        signer: TokenSigner,
        family_repo: Arc<dyn TokenFamilyRepo>,
        principal_repo: Arc<dyn PrincipalRepo>,
        revocation_list: Arc<dyn RevocationList>,
        tx_manager: Arc<dyn TxManager>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            signer,
            family_repo,
            principal_repo,
            revocation_list,
            tx_manager,
            policy,
        }
    }

    fn derive_claims(view: &PrincipalView, record: &TokenFamilyRecord, kind: TokenKind) -> Claims {
        let (jwt_id, expires_at) = match kind {
            TokenKind::Access => (record.access_token_id, record.access_expires_at),
            TokenKind::Refresh => (record.refresh_token_id, record.refresh_expires_at),
        };
        Claims {
            sub: view.subject.clone(),
            user_id: view.user_id,
            jwt_id,
            family_id: record.family_id,
            token_kind: kind,
            provider: view.provider,
            exp: expires_at.timestamp(),
            extra: BTreeMap::new(),
        }
    }

    fn decode_expecting(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<Option<Claims>, TokenError> {
        let Some(claims) = self.signer.verify(token) else {
            return Ok(None);
        };
        if claims.token_kind != expected {
            return Err(TokenError::KindMismatch {
                expected,
                actual: claims.token_kind,
            });
        }
        Ok(Some(claims))
    }

    /// How far past `exp` a token may be presented on the signature-only
    /// path. An access token staler than its linked refresh token's whole
    /// TTL cannot be redeemed anyway, so the refresh TTL plus a margin
    /// bounds the window for any configured TTL.
    fn stale_decode_leeway_secs(&self) -> u64 {
        (self.policy.refresh_ttl + Duration::hours(1))
            .num_seconds()
            .max(0) as u64
    }

    /// Signature-only decode for the access token presented on refresh; it
    /// is expected to have expired by then.
    fn decode_ignoring_expiry_expecting(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<Claims, TokenError> {
        let claims = self
            .signer
            .verify_ignoring_expiry(token, self.stale_decode_leeway_secs())?;
        if claims.token_kind != expected {
            return Err(TokenError::KindMismatch {
                expected,
                actual: claims.token_kind,
            });
        }
        Ok(claims)
    }
}

#[async_trait::async_trait]
impl TokenService for JwtTokenService {
    async fn issue(&self, principal: &PrincipalView) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.policy.access_ttl;
        let refresh_expires_at = now + self.policy.refresh_ttl;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let record = match self
            .family_repo
            .find_by_user_for_update(tx.as_mut(), principal.user_id)
            .await?
        {
            None => {
                let record = TokenFamilyRecord {
                    family_id: FamilyId::generate(),
                    user_id: principal.user_id,
                    access_token_id: TokenId::generate(),
                    refresh_token_id: TokenId::generate(),
                    access_expires_at,
                    refresh_expires_at,
                    updated_at: now,
                };
                self.family_repo.insert_in_tx(tx.as_mut(), &record).await?;
                debug!(user_id = %principal.user_id, family_id = %record.family_id, "created token family");
                record
            }
            Some(mut record) => {
                record.access_token_id = TokenId::generate();
                record.refresh_token_id = TokenId::generate();
                record.access_expires_at = access_expires_at;
                record.refresh_expires_at = refresh_expires_at;
                record.updated_at = now;
                self.family_repo.update_in_tx(tx.as_mut(), &record).await?;
                record
            }
        };

        tx.commit()
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let access_token = self
            .signer
            .sign(&Self::derive_claims(principal, &record, TokenKind::Access))?;
        let refresh_token = self
            .signer
            .sign(&Self::derive_claims(principal, &record, TokenKind::Refresh))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    async fn refresh(
        &self,
        presented_access: &str,
        presented_refresh: &str,
    ) -> Result<TokenPair, TokenError> {
        let refresh_claims = self
            .decode_expecting(presented_refresh, TokenKind::Refresh)?
            .ok_or(TokenError::InvalidToken)?;

        let access_claims =
            self.decode_ignoring_expiry_expecting(presented_access, TokenKind::Access)?;

        if access_claims.sub != refresh_claims.sub {
            warn!(sub = %refresh_claims.sub, "refresh with unlinked token pair");
            return Err(TokenError::UnlinkedTokens);
        }

        // The expiry the presented refresh token claims for itself, whole
        // seconds. Matching it against the stored row is the reuse check.
        let claimed_refresh_expiry = refresh_claims.exp;

        let principal = self
            .principal_repo
            .find_by_subject_and_provider(&refresh_claims.sub, refresh_claims.provider)
            .await?
            .ok_or(TokenError::UnknownPrincipal)?;

        let now = Utc::now();
        let access_expires_at = now + self.policy.access_ttl;
        let refresh_expires_at = now + self.policy.refresh_ttl;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let mut record = self
            .family_repo
            .find_by_user_for_update(tx.as_mut(), principal.user_id)
            .await?
            .ok_or(TokenError::UnknownFamily)?;

        if record.updated_at + self.policy.refresh_min_interval > now {
            return Err(TokenError::Throttled);
        }

        if record.refresh_expires_at.timestamp() != claimed_refresh_expiry {
            warn!(
                user_id = %principal.user_id,
                family_id = %record.family_id,
                "stale refresh token presented after rotation"
            );
            return Err(TokenError::ReusedRefreshToken);
        }

        record.access_expires_at = access_expires_at;
        record.refresh_expires_at = refresh_expires_at;
        record.updated_at = now;
        if self.policy.rotate_refresh_id {
            record.refresh_token_id = TokenId::generate();
        }
        self.family_repo.update_in_tx(tx.as_mut(), &record).await?;

        tx.commit()
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        // New access token keeps the presented claim set (extension claims
        // included), only the expiry is refreshed. The refresh token is
        // derived fresh from the family row.
        let mut new_access_claims = access_claims;
        new_access_claims.exp = access_expires_at.timestamp();
        let access_token = self.signer.sign(&new_access_claims)?;

        let refresh_token = self.signer.sign(&Self::derive_claims(
            &principal.view(),
            &record,
            TokenKind::Refresh,
        ))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    async fn validate(
        &self,
        token: &str,
        expected_kind: TokenKind,
    ) -> Result<Option<Claims>, TokenError> {
        self.decode_expecting(token, expected_kind)
    }

    async fn check_revocation(&self, jwt_id: TokenId) -> Result<RevocationStatus, TokenError> {
        if !self.revocation_list.is_revoked(jwt_id).await? {
            return Ok(RevocationStatus::Clear);
        }

        let actions = self.revocation_list.pending_actions(jwt_id).await?;
        // Remediation is the caller's concern; the entry is consumed after
        // a single inspection and the token stays rejected either way.
        self.revocation_list.clear(jwt_id).await?;
        warn!(%jwt_id, pending = actions.len(), "revoked token id presented");

        Ok(RevocationStatus::Revoked { actions })
    }

    async fn with_updated_claims(
        &self,
        new_claims: BTreeMap<String, serde_json::Value>,
        token: &str,
    ) -> Result<String, TokenError> {
        let mut claims = self
            .signer
            .verify_ignoring_expiry(token, self.stale_decode_leeway_secs())?;
        for (key, value) in new_claims {
            if RESERVED_CLAIM_KEYS.contains(&key.as_str()) {
                continue;
            }
            claims.extra.insert(key, value);
        }
        self.signer.sign(&claims)
    }

    async fn with_removed_claims(
        &self,
        keys: &[String],
        token: &str,
    ) -> Result<String, TokenError> {
        let mut claims = self
            .signer
            .verify_ignoring_expiry(token, self.stale_decode_leeway_secs())?;
        for key in keys {
            claims.extra.remove(key);
        }
        self.signer.sign(&claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::*;

    const SECRET: &[u8] = b"engine-test-secret";

    struct Harness {
        service: JwtTokenService,
        principals: Arc<MemoryPrincipalRepo>,
        revocations: Arc<MemoryRevocationList>,
    }

    fn harness(policy: TokenPolicy) -> Harness {
        let principals = Arc::new(MemoryPrincipalRepo::new());
        let revocations = Arc::new(MemoryRevocationList::new());
        let service = JwtTokenService::new(
            TokenSigner::new(SECRET),
            Arc::new(MemoryTokenFamilyRepo::new()),
            principals.clone(),
            revocations.clone(),
            Arc::new(MemoryTxManager::new()),
            policy,
        );
        Harness {
            service,
            principals,
            revocations,
        }
    }

    fn no_throttle() -> TokenPolicy {
        TokenPolicy {
            refresh_min_interval: Duration::zero(),
            ..TokenPolicy::default()
        }
    }

    fn seed_principal(harness: &Harness, subject: &str) -> PrincipalView {
        let record = PrincipalRecord {
            user_id: UserId(uuid::Uuid::new_v4()),
            subject: subject.to_string(),
            provider: Provider::Local,
            password_hash: String::new(),
            email_verified: true,
            created_at: Utc::now(),
        };
        let view = record.view();
        harness.principals.insert(record);
        view
    }

    #[tokio::test]
    async fn issue_then_validate_returns_subject() {
        let h = harness(TokenPolicy::default());
        let alice = seed_principal(&h, "alice@example.com");

        let pair = h.service.issue(&alice).await.unwrap();
        let claims = h
            .service
            .validate(&pair.access_token, TokenKind::Access)
            .await
            .unwrap()
            .expect("freshly issued access token must validate");

        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.user_id, alice.user_id);
        assert_eq!(claims.token_kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reused_token() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");

        let pair0 = h.service.issue(&alice).await.unwrap();
        // Expiry drift is what marks the old token as consumed, and it has
        // whole-second granularity; make sure the rotation lands in a
        // later second than the issuance.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let pair1 = h
            .service
            .refresh(&pair0.access_token, &pair0.refresh_token)
            .await
            .unwrap();

        // The consumed refresh token no longer matches the stored expiry.
        let err = h
            .service
            .refresh(&pair1.access_token, &pair0.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::ReusedRefreshToken));

        // The rotated one still works.
        h.service
            .refresh(&pair1.access_token, &pair1.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_of_one_token_rotate_exactly_once() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();
        // Land the rotations in a later second than the issuance so the
        // loser's expiry check cannot pass by granularity.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let service = Arc::new(h.service);
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = service.clone();
            let barrier = barrier.clone();
            let access = pair.access_token.clone();
            let refresh = pair.refresh_token.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service.refresh(&access, &refresh).await
            }));
        }

        // The transaction serializes the read-modify-write, so one caller
        // rotates and the other must observe the rotated expiry.
        let mut rotated = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => rotated += 1,
                Err(e) => assert!(matches!(e, TokenError::ReusedRefreshToken)),
            }
        }
        assert_eq!(rotated, 1);
    }

    #[tokio::test]
    async fn refresh_rejects_unlinked_pair() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");
        let bob = seed_principal(&h, "bob@example.com");

        let alice_pair = h.service.issue(&alice).await.unwrap();
        let bob_pair = h.service.issue(&bob).await.unwrap();

        let err = h
            .service
            .refresh(&alice_pair.access_token, &bob_pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::UnlinkedTokens));
    }

    #[tokio::test]
    async fn rapid_refresh_is_throttled() {
        let h = harness(TokenPolicy::default());
        let alice = seed_principal(&h, "alice@example.com");

        // Issuance touches updated_at, so a refresh inside the five-second
        // window must bounce without consuming the refresh token.
        let pair = h.service.issue(&alice).await.unwrap();
        let err = h
            .service
            .refresh(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Throttled));
    }

    #[tokio::test]
    async fn validate_reports_kind_mismatch_as_distinct_error() {
        let h = harness(TokenPolicy::default());
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();

        let err = h
            .service
            .validate(&pair.refresh_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::KindMismatch {
                expected: TokenKind::Access,
                actual: TokenKind::Refresh,
            }
        ));
    }

    #[tokio::test]
    async fn validate_soft_rejects_garbage() {
        let h = harness(TokenPolicy::default());
        let decoded = h
            .service
            .validate("not-a-token", TokenKind::Access)
            .await
            .unwrap();
        assert!(decoded.is_none());
    }

    #[tokio::test]
    async fn expired_refresh_token_is_invalid_not_reused() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");
        h.service.issue(&alice).await.unwrap();

        // A refresh token whose own expiry lies in the past, e.g. a client
        // coming back after the full refresh TTL has elapsed.
        let signer = TokenSigner::new(SECRET);
        let expired = Claims {
            sub: alice.subject.clone(),
            user_id: alice.user_id,
            jwt_id: TokenId::generate(),
            family_id: FamilyId::generate(),
            token_kind: TokenKind::Refresh,
            provider: Provider::Local,
            exp: (Utc::now() - Duration::days(9)).timestamp(),
            extra: BTreeMap::new(),
        };
        let expired_refresh = signer.sign(&expired).unwrap();
        let access = signer
            .sign(&Claims {
                token_kind: TokenKind::Access,
                exp: Utc::now().timestamp() + 60,
                ..expired.clone()
            })
            .unwrap();

        let err = h.service.refresh(&access, &expired_refresh).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken));
    }

    #[tokio::test]
    async fn access_token_stale_for_weeks_still_refreshes_within_refresh_ttl() {
        let policy = TokenPolicy {
            refresh_ttl: Duration::days(30),
            ..no_throttle()
        };
        let h = harness(policy);
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();

        // A client coming back near the end of a long refresh TTL presents
        // an access token that expired weeks ago.
        let refresh_claims = h
            .service
            .validate(&pair.refresh_token, TokenKind::Refresh)
            .await
            .unwrap()
            .unwrap();
        let stale_access = TokenSigner::new(SECRET)
            .sign(&Claims {
                token_kind: TokenKind::Access,
                jwt_id: TokenId::generate(),
                exp: (Utc::now() - Duration::days(20)).timestamp(),
                ..refresh_claims
            })
            .unwrap();

        h.service
            .refresh(&stale_access, &pair.refresh_token)
            .await
            .expect("staleness within the refresh TTL must not block rotation");
    }

    #[tokio::test]
    async fn refresh_for_unknown_principal_is_not_found() {
        let h = harness(no_throttle());

        let signer = TokenSigner::new(SECRET);
        let claims = Claims {
            sub: "ghost@example.com".to_string(),
            user_id: UserId(uuid::Uuid::new_v4()),
            jwt_id: TokenId::generate(),
            family_id: FamilyId::generate(),
            token_kind: TokenKind::Refresh,
            provider: Provider::Local,
            exp: (Utc::now() + Duration::days(7)).timestamp(),
            extra: BTreeMap::new(),
        };
        let refresh = signer.sign(&claims).unwrap();
        let access = signer
            .sign(&Claims {
                token_kind: TokenKind::Access,
                ..claims.clone()
            })
            .unwrap();

        let err = h.service.refresh(&access, &refresh).await.unwrap_err();
        assert!(matches!(err, TokenError::UnknownPrincipal));
    }

    #[tokio::test]
    async fn refresh_without_family_is_not_found() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");

        // Principal exists but no pair was ever issued.
        let signer = TokenSigner::new(SECRET);
        let claims = Claims {
            sub: alice.subject.clone(),
            user_id: alice.user_id,
            jwt_id: TokenId::generate(),
            family_id: FamilyId::generate(),
            token_kind: TokenKind::Refresh,
            provider: Provider::Local,
            exp: (Utc::now() + Duration::days(7)).timestamp(),
            extra: BTreeMap::new(),
        };
        let refresh = signer.sign(&claims).unwrap();
        let access = signer
            .sign(&Claims {
                token_kind: TokenKind::Access,
                ..claims.clone()
            })
            .unwrap();

        let err = h.service.refresh(&access, &refresh).await.unwrap_err();
        assert!(matches!(err, TokenError::UnknownFamily));
    }

    #[tokio::test]
    async fn revoked_id_is_reported_and_entry_cleared_once() {
        let h = harness(TokenPolicy::default());
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();
        let claims = h
            .service
            .validate(&pair.access_token, TokenKind::Access)
            .await
            .unwrap()
            .unwrap();

        let mut actions = BTreeMap::new();
        actions.insert("scope".to_string(), RevocationAction::InvalidateClaim);
        h.revocations.revoke(claims.jwt_id, actions.clone());

        let status = h.service.check_revocation(claims.jwt_id).await.unwrap();
        assert_eq!(status, RevocationStatus::Revoked { actions });

        // Cleared after one inspection.
        let status = h.service.check_revocation(claims.jwt_id).await.unwrap();
        assert_eq!(status, RevocationStatus::Clear);
    }

    #[tokio::test]
    async fn claim_patches_survive_refresh_on_the_access_token() {
        let h = harness(no_throttle());
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();

        let mut patch = BTreeMap::new();
        patch.insert("scope".to_string(), serde_json::json!("todo:write"));
        let patched_access = h
            .service
            .with_updated_claims(patch, &pair.access_token)
            .await
            .unwrap();

        let rotated = h
            .service
            .refresh(&patched_access, &pair.refresh_token)
            .await
            .unwrap();
        let claims = h
            .service
            .validate(&rotated.access_token, TokenKind::Access)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(claims.extra.get("scope"), Some(&serde_json::json!("todo:write")));
        assert_eq!(claims.exp, rotated.access_expires_at.timestamp());
    }

    #[tokio::test]
    async fn claim_editing_preserves_subject_and_expiry() {
        let h = harness(TokenPolicy::default());
        let alice = seed_principal(&h, "alice@example.com");
        let pair = h.service.issue(&alice).await.unwrap();
        let before = h
            .service
            .validate(&pair.access_token, TokenKind::Access)
            .await
            .unwrap()
            .unwrap();

        let mut patch = BTreeMap::new();
        patch.insert("theme".to_string(), serde_json::json!("dark"));
        // Attempts to shadow closed fields are dropped.
        patch.insert("sub".to_string(), serde_json::json!("mallory@example.com"));
        let patched = h
            .service
            .with_updated_claims(patch, &pair.access_token)
            .await
            .unwrap();

        let after = h
            .service
            .validate(&patched, TokenKind::Access)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.sub, before.sub);
        assert_eq!(after.exp, before.exp);
        assert_eq!(after.extra.get("theme"), Some(&serde_json::json!("dark")));

        let stripped = h
            .service
            .with_removed_claims(&["theme".to_string()], &patched)
            .await
            .unwrap();
        let after = h
            .service
            .validate(&stripped, TokenKind::Access)
            .await
            .unwrap()
            .unwrap();
        assert!(after.extra.get("theme").is_none());
    }

    #[tokio::test]
    async fn optional_refresh_id_rotation_changes_jwt_id() {
        let policy = TokenPolicy {
            rotate_refresh_id: true,
            ..no_throttle()
        };
        let h = harness(policy);
        let alice = seed_principal(&h, "alice@example.com");

        let pair0 = h.service.issue(&alice).await.unwrap();
        let refresh0 = h
            .service
            .validate(&pair0.refresh_token, TokenKind::Refresh)
            .await
            .unwrap()
            .unwrap();

        let pair1 = h
            .service
            .refresh(&pair0.access_token, &pair0.refresh_token)
            .await
            .unwrap();
        let refresh1 = h
            .service
            .validate(&pair1.refresh_token, TokenKind::Refresh)
            .await
            .unwrap()
            .unwrap();

        assert_ne!(refresh0.jwt_id, refresh1.jwt_id);
        assert_eq!(refresh0.family_id, refresh1.family_id);
    }
}
