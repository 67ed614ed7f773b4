use serde::Deserialize;

pub mod auth;
pub mod csrf;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod server;

/// OpenID Connect provider credentials, read from `OIDC_*` variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ProviderConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Application settings, read from `APP_*` variables.
#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
    /// Public origin of this app, e.g. `http://localhost:3000`.
    pub base_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_logout_success_url")]
    pub logout_success_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Lifetime of a login session, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl AppConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bind_addr: default_bind_addr(),
            secure_cookies: false,
            logout_success_url: default_logout_success_url(),
            scopes: default_scopes(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_logout_success_url() -> String {
    "/".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["profile".to_string()]
}

fn default_session_ttl_secs() -> u64 {
    24 * 60 * 60
}
