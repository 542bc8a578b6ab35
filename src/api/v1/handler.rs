use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::PrincipalRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        let mut errors = std::collections::BTreeMap::new();
        errors.insert(code.field(), message.into());
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError { code, errors }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub subject: String,
    pub password: String,
}

/// Expiry metadata in the body; the tokens themselves travel in the
/// `Authorization` and `X-Refresh-Token` headers.
#[derive(Debug, Serialize)]
pub struct TokenGrantResponse {
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

fn reply_with_token_headers(pair: TokenPair) -> impl warp::Reply {
    let body = ApiResponse::ok(TokenGrantResponse {
        access_expires_at: pair.access_expires_at,
        refresh_expires_at: pair.refresh_expires_at,
    });
    let reply = warp::reply::json(&body);
    let reply = warp::reply::with_header(
        reply,
        "Authorization",
        format!("Bearer {}", pair.access_token),
    );
    warp::reply::with_header(reply, "X-Refresh-Token", pair.refresh_token)
}

pub async fn login(
    body: LoginRequest,
    login_service: Arc<dyn LoginService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pair = login_service
        .login(LoginInput {
            subject: body.subject,
            password: body.password,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(reply_with_token_headers(pair))
}

pub async fn refresh(
    access_header: String,
    refresh_header: String,
    token_service: Arc<dyn TokenService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let presented_access = access_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;

    let pair = token_service
        .refresh(presented_access, &refresh_header)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(reply_with_token_headers(pair))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub subject: String,
    pub provider: Provider,
}

pub async fn me(principal: PrincipalRecord) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(MeResponse {
        user_id: principal.user_id,
        subject: principal.subject,
        provider: principal.provider,
    })))
}
