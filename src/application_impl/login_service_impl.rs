use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;
use tracing::info;

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, LoginError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| LoginError::Token(TokenError::Store(e.to_string())))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, LoginError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| LoginError::Token(TokenError::Store(format!("invalid PHC hash: {e}"))))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(LoginError::Token(TokenError::Store(format!(
                "verify error: {e}"
            )))),
        }
    }
}

/// Local-provider login: directory lookup, verified-email check, password
/// verify, then a fresh pair through the engine.
pub struct RealLoginService {
    principal_repo: Arc<dyn PrincipalRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
}

impl RealLoginService {
    pub fn new(
        principal_repo: Arc<dyn PrincipalRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            principal_repo,
            credential_hasher,
            token_service,
        }
    }
}

#[async_trait::async_trait]
impl LoginService for RealLoginService {
    async fn login(&self, request: LoginInput) -> Result<TokenPair, LoginError> {
        let record = self
            .principal_repo
            .find_by_subject_and_provider(&request.subject, Provider::Local)
            .await?
            .ok_or(LoginError::InvalidCredentials)?;

        if !record.email_verified {
            return Err(LoginError::EmailNotVerified);
        }

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &record.password_hash)
            .await?;
        if !ok {
            return Err(LoginError::InvalidCredentials);
        }

        let pair = self.token_service.issue(&record.view()).await?;
        info!(user_id = %record.user_id, "issued token pair on login");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtTokenService, TokenPolicy, TokenSigner};
    use crate::infra_memory::*;
    use chrono::Utc;

    async fn service_with_user(subject: &str, password: &str, verified: bool) -> RealLoginService {
        let principals = Arc::new(MemoryPrincipalRepo::new());
        let hasher = Arc::new(Argon2PasswordHasher);

        let password_hash = hasher.hash_password(password).await.unwrap();
        principals.insert(PrincipalRecord {
            user_id: UserId(uuid::Uuid::new_v4()),
            subject: subject.to_string(),
            provider: Provider::Local,
            password_hash,
            email_verified: verified,
            created_at: Utc::now(),
        });

        let token_service = Arc::new(JwtTokenService::new(
            TokenSigner::new(b"login-test-secret"),
            Arc::new(MemoryTokenFamilyRepo::new()),
            principals.clone(),
            Arc::new(MemoryRevocationList::new()),
            Arc::new(MemoryTxManager::new()),
            TokenPolicy::default(),
        ));

        RealLoginService::new(principals, hasher, token_service)
    }

    #[tokio::test]
    async fn login_with_correct_password_issues_pair() {
        let service = service_with_user("alice@example.com", "correct horse", true).await;

        let pair = service
            .login(LoginInput {
                subject: "alice@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        assert!(pair.access_expires_at < pair.refresh_expires_at);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let service = service_with_user("alice@example.com", "correct horse", true).await;

        let err = service
            .login(LoginInput {
                subject: "alice@example.com".to_string(),
                password: "battery staple".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_for_unknown_subject_is_rejected() {
        let service = service_with_user("alice@example.com", "correct horse", true).await;

        let err = service
            .login(LoginInput {
                subject: "nobody@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_requires_verified_email() {
        let service = service_with_user("alice@example.com", "correct horse", false).await;

        let err = service
            .login(LoginInput {
                subject: "alice@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::EmailNotVerified));
    }
}
