use crate::auth::UserProfile;
use crate::error::AppError;
use crate::server::COOKIE_NAME;
use async_session::{MemoryStore, Session, SessionStore};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use headers::HeaderMapExt;

pub const PROFILE_KEY: &str = "profile";

/// The session referenced by the request's session cookie, if it still exists.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    MemoryStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = MemoryStore::from_ref(state);

        let session_cookie = match parts
            .headers
            .typed_get::<headers::Cookie>()
            .and_then(|cookies| cookies.get(COOKIE_NAME).map(str::to_owned))
        {
            Some(cookie) => cookie,
            None => return Ok(CurrentSession(None)),
        };

        // A cookie that does not decode to a session id is treated as absent.
        match store.load_session(session_cookie).await {
            Ok(session) => Ok(CurrentSession(session)),
            Err(e) => {
                tracing::debug!("unreadable session cookie: {}", e);
                Ok(CurrentSession(None))
            }
        }
    }
}

/// A logged-in user. Requests without a live session are rejected with `401`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    inner: UserProfile,
}

impl CurrentUser {
    pub fn profile(&self) -> &UserProfile {
        &self.inner
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    MemoryStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;

        let profile = session
            .and_then(|session| session.get::<UserProfile>(PROFILE_KEY))
            .ok_or(AppError::Unauthenticated)?;

        Ok(CurrentUser { inner: profile })
    }
}
