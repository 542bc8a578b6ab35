use crate::application_port::TokenError;
use crate::domain_model::TokenPair;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("email or password isn't correct")]
    InvalidCredentials,
    #[error("email is not verified")]
    EmailNotVerified,
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub subject: String,
    pub password: String,
}

/// Local-provider login boundary: credential check, then issuance through
/// the lifecycle engine.
#[async_trait::async_trait]
pub trait LoginService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<TokenPair, LoginError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, LoginError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, LoginError>;
}
