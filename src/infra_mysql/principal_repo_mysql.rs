use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

pub struct MySqlPrincipalRepo {
    pool: MySqlPool,
}

impl MySqlPrincipalRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlPrincipalRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<PrincipalRecord, TokenError> {
        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let user_id = UserId(
            Uuid::from_slice(&user_id_bytes).map_err(|e| TokenError::Store(e.to_string()))?,
        );

        let subject: String = row
            .try_get("subject")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let provider_raw: String = row
            .try_get("provider")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let provider: Provider = provider_raw.parse().map_err(TokenError::Store)?;

        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let email_verified: bool = row
            .try_get("email_verified")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(PrincipalRecord {
            user_id,
            subject,
            provider,
            password_hash,
            email_verified,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for MySqlPrincipalRepo {
    async fn find_by_subject_and_provider(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<Option<PrincipalRecord>, TokenError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, subject, provider, password_hash, email_verified, created_at
FROM principal
WHERE subject = ? AND provider = ?
"#,
        )
        .bind(subject)
        .bind(provider.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TokenError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
