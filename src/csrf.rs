//! Double-submit cookie CSRF protection.
//!
//! Every response to a safe request that arrives without a token cookie sets
//! one. The cookie is readable by page scripts, which echo it back in a header
//! on state-changing requests. A cross-site page cannot read the cookie, so it
//! cannot forge the header.

use crate::error::AppError;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};
use headers::HeaderMapExt;
use openidconnect::CsrfToken;

pub const CSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const CSRF_HEADER_NAME: &str = "x-xsrf-token";

#[derive(Clone, Debug)]
pub struct CsrfConfig {
    pub cookie_name: String,
    pub header_name: HeaderName,
    pub secure: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: CSRF_COOKIE_NAME.to_string(),
            header_name: HeaderName::from_static(CSRF_HEADER_NAME),
            secure: false,
        }
    }
}

impl CsrfConfig {
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// A fresh token cookie. Not `HttpOnly`: the page script has to read it.
    pub fn token_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(false)
            .secure(self.secure)
            .build()
    }

    /// Cookie that makes the browser drop the current token.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.token_cookie(String::new());
        cookie.make_removal();
        cookie
    }

    fn cookie_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .typed_get::<headers::Cookie>()
            .and_then(|cookies| cookies.get(&self.cookie_name).map(str::to_owned))
            .filter(|token| !token.is_empty())
    }

    fn header_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok())
            .filter(|token| !token.is_empty())
    }

    /// Checks a state-changing request: cookie and header must both be
    /// present and equal.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let cookie = self.cookie_token(headers).ok_or(AppError::MissingCsrfToken)?;
        let header = self.header_token(headers).ok_or(AppError::MissingCsrfToken)?;

        if constant_time_eq(cookie.as_bytes(), header.as_bytes()) {
            Ok(())
        } else {
            Err(AppError::InvalidCsrfToken)
        }
    }
}

pub fn generate_token() -> String {
    CsrfToken::new_random().secret().to_owned()
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn set_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("unencodable cookie {}: {}", cookie.name(), e),
    }
}

/// Middleware enforcing the double-submit check on every route.
pub async fn protect<B>(
    State(config): State<CsrfConfig>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    if is_safe_method(request.method()) {
        let needs_token = config.cookie_token(request.headers()).is_none();
        let mut response = next.run(request).await;

        // A handler may already have rotated or removed the token.
        let handled = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&format!("{}=", config.cookie_name)));

        if needs_token && !handled {
            set_cookie(&mut response, &config.token_cookie(generate_token()));
        }
        return response;
    }

    if let Err(e) = config.verify(request.headers()) {
        tracing::warn!(method = %request.method(), uri = %request.uri(), "CSRF check failed: {}", e);
        return e.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: Option<&str>, header: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(cookie) = cookie {
            map.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        if let Some(header) = header {
            map.insert(CSRF_HEADER_NAME, HeaderValue::from_str(header).unwrap());
        }
        map
    }

    #[test]
    fn matching_cookie_and_header_pass() {
        let config = CsrfConfig::default();
        let map = headers(Some("auth-session=abc; XSRF-TOKEN=t0k3n"), Some("t0k3n"));

        assert!(config.verify(&map).is_ok());
    }

    #[test]
    fn missing_header_is_rejected() {
        let config = CsrfConfig::default();
        let map = headers(Some("XSRF-TOKEN=t0k3n"), None);

        assert!(matches!(config.verify(&map), Err(AppError::MissingCsrfToken)));
    }

    #[test]
    fn missing_cookie_is_rejected() {
        let config = CsrfConfig::default();
        let map = headers(None, Some("t0k3n"));

        assert!(matches!(config.verify(&map), Err(AppError::MissingCsrfToken)));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let config = CsrfConfig::default();
        let map = headers(Some("XSRF-TOKEN="), Some(""));

        assert!(matches!(config.verify(&map), Err(AppError::MissingCsrfToken)));
    }

    #[test]
    fn mismatched_header_is_rejected() {
        let config = CsrfConfig::default();
        let map = headers(Some("XSRF-TOKEN=t0k3n"), Some("t0k3m"));

        assert!(matches!(config.verify(&map), Err(AppError::InvalidCsrfToken)));
    }

    #[test]
    fn only_safe_methods_skip_the_check() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
        assert!(!is_safe_method(&Method::PATCH));
    }

    #[test]
    fn token_cookie_is_readable_by_scripts() {
        let cookie = CsrfConfig::default().token_cookie("abc".into());

        assert_eq!(cookie.name(), "XSRF-TOKEN");
        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
        assert!(!cookie.to_string().contains("HttpOnly"));
    }

    #[test]
    fn generated_tokens_differ() {
        let a = generate_token();
        let b = generate_token();

        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_compares_whole_input() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
