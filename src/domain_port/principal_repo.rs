use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Directory record for a principal. `password_hash` is empty for OAuth2
/// providers; the engine itself only ever reads identity fields.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    pub user_id: UserId,
    pub subject: String,
    pub provider: Provider,
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl PrincipalRecord {
    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            user_id: self.user_id,
            subject: self.subject.clone(),
            provider: self.provider,
        }
    }
}

#[async_trait::async_trait]
pub trait PrincipalRepo: Send + Sync {
    async fn find_by_subject_and_provider(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<Option<PrincipalRecord>, TokenError>;
}
