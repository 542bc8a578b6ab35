use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{PrincipalRecord, RateGate};
use crate::server::Server;
use chrono::Utc;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.login_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("token"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::header::<String>(http::header::AUTHORIZATION.as_ref()))
        .and(warp::header::<String>("x-refresh-token"))
        .and(with(server.token_service.clone()))
        .and_then(handler::refresh);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_authentication(server.clone()))
        .and_then(handler::me);

    with_rate_gate(server.rate_gate.clone()).and(login.or(refresh).or(me))
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Per-client request gate in front of every route. The proxy header wins
/// over the socket address when present.
fn with_rate_gate(
    gate: Arc<dyn RateGate>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::addr::remote())
        .and_then(
            move |forwarded: Option<String>, addr: Option<SocketAddr>| {
                let gate = gate.clone();
                async move {
                    let client = forwarded
                        .unwrap_or_else(|| addr.map(|a| a.ip().to_string()).unwrap_or_default());
                    if gate.allow(&client, Utc::now().timestamp_millis()) {
                        Ok(())
                    } else {
                        Err(reject::custom(ApiErrorCode::RateLimited))
                    }
                }
            },
        )
        .untuple_one()
}

/// The per-request ingress filter: bearer extraction, access-token
/// validation, revocation check, principal lookup. Successful requests
/// get the authenticated principal injected.
fn with_authentication(
    server: Arc<Server>,
) -> impl Filter<Extract = (PrincipalRecord,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |header: String| {
        let server = server.clone();
        async move {
            let Some(token) = header.strip_prefix("Bearer ") else {
                return Err(reject::custom(ApiErrorCode::InvalidToken));
            };

            let claims = server
                .token_service
                .validate(token, TokenKind::Access)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?
                .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;

            match server
                .token_service
                .check_revocation(claims.jwt_id)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?
            {
                RevocationStatus::Revoked { .. } => {
                    return Err(reject::custom(ApiErrorCode::RevokedToken));
                }
                RevocationStatus::Clear => {}
            }

            let principal = server
                .principal_repo
                .find_by_subject_and_provider(&claims.sub, claims.provider)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?
                .ok_or_else(|| reject::custom(ApiErrorCode::UnknownPrincipal))?;

            Ok::<PrincipalRecord, warp::Rejection>(principal)
        }
    })
}
