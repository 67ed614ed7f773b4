use crate::auth::{Authenticator, UserProfile};
use crate::csrf::{self, CsrfConfig};
use crate::extractor::{CurrentSession, PROFILE_KEY};
use crate::server::COOKIE_NAME;
use crate::AppConfig;
use anyhow::Context;
use async_session::{MemoryStore, Session, SessionStore};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    code: String,
    state: String,
}

#[instrument(skip_all)]
pub async fn callback(
    Query(query): Query<AuthRequest>,
    CurrentSession(previous): CurrentSession,
    State(store): State<MemoryStore>,
    State(auth): State<Authenticator>,
    State(csrf): State<CsrfConfig>,
    State(config): State<Arc<AppConfig>>,
) -> Response {
    let result = match auth.verify_code(query.state, query.code).await {
        Ok(profile) => {
            let ttl = Duration::from_secs(config.session_ttl_secs);
            start_session(&store, previous, profile, ttl).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(session_cookie) => {
            let mut response = Redirect::to("/").into_response();
            csrf::set_cookie(
                &mut response,
                &session_cookie_for(session_cookie, config.secure_cookies),
            );
            // fresh token for the authenticated session
            csrf::set_cookie(&mut response, &csrf.token_cookie(csrf::generate_token()));
            response
        }
        Err(e) => {
            tracing::warn!("login failed: {:#}", e);
            Redirect::to("/?error=true").into_response()
        }
    }
}

/// Replaces whatever session the browser held with a fresh one for `profile`
/// and returns the new cookie value.
pub(crate) async fn start_session(
    store: &MemoryStore,
    previous: Option<Session>,
    profile: UserProfile,
    ttl: Duration,
) -> anyhow::Result<String> {
    if let Some(previous) = previous {
        store.destroy_session(previous).await?;
    }

    let mut session = Session::new();
    session.expire_in(ttl);
    session.insert(PROFILE_KEY, &profile)?;

    let cookie = store
        .store_session(session)
        .await?
        .context("cookie string not found")?;

    tracing::info!(subject = %profile.subject, "logged in");

    Ok(cookie)
}

fn session_cookie_for(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}
