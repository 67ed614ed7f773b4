use crate::{
    auth::Authenticator,
    csrf::{self, CsrfConfig},
    handler, AppConfig, ProviderConfig,
};
use async_session::MemoryStore;
use axum::{
    extract::FromRef,
    http::Request,
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use axum_extra::routing::SpaRouter;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::Span;

pub const COOKIE_NAME: &str = "auth-session";
const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

pub async fn start_server(provider: ProviderConfig, config: AppConfig) -> anyhow::Result<()> {
    let authenticator = Authenticator::discover(provider, &config).await?;
    let addr: SocketAddr = config.bind_addr.parse()?;
    let store = MemoryStore::new();
    tokio::spawn(expire_sessions(store.clone(), SESSION_CLEANUP_PERIOD));
    let app = app(AppState::with_store(authenticator, config, store));

    tracing::debug!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// Drops expired sessions from `store` every `period`.
pub async fn expire_sessions(store: MemoryStore, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let before = store.count().await;
        match store.cleanup().await {
            Ok(()) => tracing::debug!(
                "session cleanup: {} of {} left",
                store.count().await,
                before
            ),
            Err(e) => tracing::error!("session cleanup failed: {:?}", e),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let csrf_config = state.csrf.clone();

    Router::new()
        .route("/", get(handler::home))
        .route("/login", get(handler::login))
        .route("/callback", get(handler::callback))
        .route("/user", get(handler::user))
        .route("/logout", post(handler::logout))
        .with_state(state)
        .merge(SpaRouter::new("/public", "static"))
        .layer(middleware::from_fn_with_state(csrf_config, csrf::protect))
        .layer(
            TraceLayer::new_for_http()
                .on_request(|request: &Request<_>, _span: &Span| {
                    tracing::info!("{} {}", request.method(), request.uri());
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    tracing::info!("{} in {:?}", response.status(), latency);
                })
                .on_failure(
                    |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                        tracing::error!("{} after {:?}", error, latency);
                    },
                ),
        )
}

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    // `MemoryStore` keeps sessions for the lifetime of the process only.
    store: MemoryStore,
    csrf: CsrfConfig,
    config: Arc<AppConfig>,
}

impl AppState {
    pub fn with_store(authenticator: Authenticator, config: AppConfig, store: MemoryStore) -> Self {
        Self {
            authenticator,
            store,
            csrf: CsrfConfig::default().secure(config.secure_cookies),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

impl FromRef<AppState> for MemoryStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for CsrfConfig {
    fn from_ref(state: &AppState) -> Self {
        state.csrf.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
