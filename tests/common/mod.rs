#![allow(dead_code)]

use async_session::{MemoryStore, Session, SessionStore};
use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use openidconnect::{
    core::{
        CoreJwsSigningAlgorithm, CoreProviderMetadata, CoreResponseType,
        CoreSubjectIdentifierType,
    },
    AuthUrl, EmptyAdditionalProviderMetadata, IssuerUrl, JsonWebKeySetUrl, ResponseTypes,
    TokenUrl,
};
use social_logout::{
    auth::{Authenticator, UserProfile, LOGIN_TTL},
    extractor::PROFILE_KEY,
    server::{app, AppState},
    AppConfig, ProviderConfig,
};
use std::time::Duration;
use tower::ServiceExt;

pub const PROVIDER: &str = "https://provider.example";
/// Nothing listens here, so code exchanges fail fast without leaving the host.
pub const CLOSED_TOKEN_ENDPOINT: &str = "http://127.0.0.1:9/token";

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub authenticator: Authenticator,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with_login_ttl(LOGIN_TTL)
}

pub fn setup_test_app_with_login_ttl(login_ttl: Duration) -> TestApp {
    let config = AppConfig::new("http://localhost:3000");
    let provider = ProviderConfig {
        issuer_url: PROVIDER.to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
    };

    let metadata = CoreProviderMetadata::new(
        IssuerUrl::new(PROVIDER.to_string()).expect("issuer"),
        AuthUrl::new(format!("{}/authorize", PROVIDER)).expect("auth url"),
        JsonWebKeySetUrl::new(format!("{}/jwks", PROVIDER)).expect("jwks url"),
        vec![ResponseTypes::new(vec![CoreResponseType::Code])],
        vec![CoreSubjectIdentifierType::Public],
        vec![CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256],
        EmptyAdditionalProviderMetadata {},
    )
    .set_token_endpoint(Some(
        TokenUrl::new(CLOSED_TOKEN_ENDPOINT.to_string()).expect("token url"),
    ));

    let authenticator = Authenticator::from_metadata(provider, &config, metadata)
        .expect("authenticator")
        .with_login_ttl(login_ttl);
    let store = MemoryStore::new();
    let router = app(AppState::with_store(
        authenticator.clone(),
        config,
        store.clone(),
    ));

    TestApp {
        router,
        store,
        authenticator,
    }
}

impl TestApp {
    /// Stores a logged-in session and returns its cookie value.
    pub async fn login_as(&self, name: &str) -> String {
        let mut session = Session::new();
        session
            .insert(
                PROFILE_KEY,
                UserProfile {
                    subject: format!("sub-{}", name),
                    name: name.to_string(),
                    picture: None,
                },
            )
            .expect("insert profile");

        self.store
            .store_session(session)
            .await
            .expect("store session")
            .expect("session cookie")
    }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    cookie: Option<&str>,
    xsrf_header: Option<&str>,
) -> Response<axum::body::BoxBody> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(token) = xsrf_header {
        builder = builder.header("X-XSRF-TOKEN", token);
    }
    let request = builder.body(Body::empty()).expect("build request");

    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("ascii cookie").to_string())
        .collect()
}

pub fn set_cookie_named<B>(response: &Response<B>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
}

pub async fn read_body(response: Response<axum::body::BoxBody>) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body")
        .to_vec()
}
