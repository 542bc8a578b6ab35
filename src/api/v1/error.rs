use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(code) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
        Ok(warp::reply::with_status(json, code.status()))
    } else if let Some(missing) = err.find::<warp::reject::MissingHeader>() {
        // A missing credential header is an unauthenticated request, not a
        // malformed one.
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidToken,
            format!("Missing header: {}", missing.name()),
        ));
        Ok(warp::reply::with_status(json, StatusCode::UNAUTHORIZED))
    } else if let Some(body_err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::BadRequest,
            body_err.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::BAD_REQUEST))
    } else if err.is_not_found() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::NotFound,
            "Resource not found".to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InternalError,
            format!("Unhandled error: {:?}", err),
        ));
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    /// Field-keyed error payload; the key names the request part the
    /// client should look at.
    pub errors: std::collections::BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token type mismatch")]
    KindMismatch,
    #[error("Tokens are not linked to each other")]
    UnlinkedTokens,
    #[error("Refresh token was already used, it can be exchanged only once")]
    ReusedRefreshToken,
    #[error("Too many refresh requests")]
    Throttled,
    #[error("Email from token subject not found")]
    UnknownPrincipal,
    #[error("There are no tokens linked to you")]
    UnknownFamily,
    #[error("Token has been revoked")]
    RevokedToken,
    #[error("Email or password isn't correct")]
    InvalidCredentials,
    #[error("Email is not verified")]
    EmailNotVerified,
    #[error("Too many requests")]
    RateLimited,
    #[error("Malformed request body")]
    BadRequest,
    #[error("Resource not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidToken | ApiErrorCode::RevokedToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::KindMismatch
            | ApiErrorCode::UnlinkedTokens
            | ApiErrorCode::ReusedRefreshToken
            | ApiErrorCode::EmailNotVerified
            | ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::Throttled | ApiErrorCode::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiErrorCode::UnknownPrincipal
            | ApiErrorCode::UnknownFamily
            | ApiErrorCode::InvalidCredentials
            | ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Which request part the error payload is keyed under.
    pub fn field(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidToken | ApiErrorCode::KindMismatch => "token",
            ApiErrorCode::UnlinkedTokens => "tokens",
            ApiErrorCode::ReusedRefreshToken | ApiErrorCode::UnknownPrincipal => "refresh_token",
            ApiErrorCode::RevokedToken => "access_token",
            ApiErrorCode::UnknownFamily => "user",
            ApiErrorCode::InvalidCredentials => "login_or_password",
            ApiErrorCode::EmailNotVerified => "email",
            ApiErrorCode::Throttled | ApiErrorCode::RateLimited | ApiErrorCode::BadRequest => {
                "request"
            }
            ApiErrorCode::NotFound | ApiErrorCode::InternalError => "server",
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<TokenError> for ApiErrorCode {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::InvalidToken => ApiErrorCode::InvalidToken,
            TokenError::KindMismatch { .. } => ApiErrorCode::KindMismatch,
            TokenError::UnlinkedTokens => ApiErrorCode::UnlinkedTokens,
            TokenError::ReusedRefreshToken => ApiErrorCode::ReusedRefreshToken,
            TokenError::Throttled => ApiErrorCode::Throttled,
            TokenError::UnknownPrincipal => ApiErrorCode::UnknownPrincipal,
            TokenError::UnknownFamily => ApiErrorCode::UnknownFamily,
            TokenError::Signing(e) => ApiErrorCode::internal(e),
            TokenError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<LoginError> for ApiErrorCode {
    fn from(error: LoginError) -> Self {
        match error {
            LoginError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            LoginError::EmailNotVerified => ApiErrorCode::EmailNotVerified,
            LoginError::Token(e) => e.into(),
        }
    }
}
