use crate::{
    csrf::{self, CsrfConfig},
    error::AppError,
    extractor::CurrentSession,
    server::COOKIE_NAME,
    AppConfig,
};
use async_session::{MemoryStore, SessionStore};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};
use std::sync::Arc;
use tracing::instrument;

/// Ends the session. The CSRF layer has already checked the request by the
/// time this runs.
#[instrument(skip_all)]
pub async fn logout(
    CurrentSession(session): CurrentSession,
    State(store): State<MemoryStore>,
    State(csrf): State<CsrfConfig>,
    State(config): State<Arc<AppConfig>>,
) -> Result<Response, AppError> {
    if let Some(session) = session {
        let id = session.id().to_owned();
        store
            .destroy_session(session)
            .await
            .map_err(AppError::Session)?;
        tracing::info!(session = %id, "logged out");
    } else {
        tracing::debug!("logout without a live session");
    }

    let mut response = Redirect::to(&config.logout_success_url).into_response();
    csrf::set_cookie(&mut response, &session_removal_cookie(config.secure_cookies));
    csrf::set_cookie(&mut response, &csrf.removal_cookie());

    Ok(response)
}

fn session_removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    cookie.make_removal();
    cookie
}
