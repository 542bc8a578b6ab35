use super::repo_tx_mysql::MySqlTx;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use uuid::Uuid;

const ER_DUP_ENTRY: u16 = 1062;

fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == ER_DUP_ENTRY;
        }
    }

    false
}

/// Every family operation runs inside a caller-owned transaction, so the
/// repo itself carries no connection state.
pub struct MySqlTokenFamilyRepo;

impl MySqlTokenFamilyRepo {
    #[inline]
    fn id_from_bytes(id: &[u8]) -> Result<Uuid, TokenError> {
        Uuid::from_slice(id).map_err(|e| TokenError::Store(e.to_string()))
    }

    fn row_to_record(row: MySqlRow) -> Result<TokenFamilyRecord, TokenError> {
        let family_id: Vec<u8> = row
            .try_get("family_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let user_id: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let access_token_id: Vec<u8> = row
            .try_get("access_token_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let refresh_token_id: Vec<u8> = row
            .try_get("refresh_token_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;

        let access_expires_at: DateTime<Utc> = row
            .try_get("access_expires_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let refresh_expires_at: DateTime<Utc> = row
            .try_get("refresh_expires_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(TokenFamilyRecord {
            family_id: FamilyId(Self::id_from_bytes(&family_id)?),
            user_id: UserId(Self::id_from_bytes(&user_id)?),
            access_token_id: TokenId(Self::id_from_bytes(&access_token_id)?),
            refresh_token_id: TokenId(Self::id_from_bytes(&refresh_token_id)?),
            access_expires_at,
            refresh_expires_at,
            updated_at,
        })
    }
}

const SELECT_BY_USER: &str = r#"
SELECT family_id, user_id, access_token_id, refresh_token_id,
       access_expires_at, refresh_expires_at, updated_at
FROM token_family
WHERE user_id = ?
"#;

#[async_trait::async_trait]
impl TokenFamilyRepo for MySqlTokenFamilyRepo {
    async fn find_by_user_for_update<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
    ) -> Result<Option<TokenFamilyRecord>, TokenError> {
        let tx = MySqlTx::from_dyn(tx);

        // Row lock held to commit; concurrent rotations for one principal
        // queue here instead of both reading the pre-rotation expiry.
        let row_opt: Option<MySqlRow> =
            sqlx::query(&format!("{SELECT_BY_USER} FOR UPDATE"))
                .bind(user_id.0.as_bytes() as &[u8])
                .fetch_optional(tx.conn())
                .await
                .map_err(|e| TokenError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError> {
        let tx = MySqlTx::from_dyn(tx);

        sqlx::query(
            r#"
INSERT INTO token_family (family_id, user_id, access_token_id, refresh_token_id,
                          access_expires_at, refresh_expires_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(record.family_id.0.as_bytes() as &[u8])
        .bind(record.user_id.0.as_bytes() as &[u8])
        .bind(record.access_token_id.0.as_bytes() as &[u8])
        .bind(record.refresh_token_id.0.as_bytes() as &[u8])
        .bind(record.access_expires_at)
        .bind(record.refresh_expires_at)
        .bind(record.updated_at)
        .execute(tx.conn())
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                TokenError::Store(format!(
                    "token family already exists for user {}",
                    record.user_id
                ))
            } else {
                TokenError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn update_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &TokenFamilyRecord,
    ) -> Result<(), TokenError> {
        let tx = MySqlTx::from_dyn(tx);

        let result = sqlx::query(
            r#"
UPDATE token_family
SET access_token_id = ?, refresh_token_id = ?,
    access_expires_at = ?, refresh_expires_at = ?, updated_at = ?
WHERE family_id = ?
"#,
        )
        .bind(record.access_token_id.0.as_bytes() as &[u8])
        .bind(record.refresh_token_id.0.as_bytes() as &[u8])
        .bind(record.access_expires_at)
        .bind(record.refresh_expires_at)
        .bind(record.updated_at)
        .bind(record.family_id.0.as_bytes() as &[u8])
        .execute(tx.conn())
        .await
        .map_err(|e| TokenError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TokenError::UnknownFamily);
        }

        Ok(())
    }
}
