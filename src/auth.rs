use crate::{error::AppError, AppConfig, ProviderConfig};
use async_lock::RwLock;
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata},
    reqwest::async_http_client,
    AccessTokenHash, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse, RedirectUrl, Scope,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use url::Url;

/// How long a started login may take before its `state` is forgotten.
pub const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug)]
struct PendingLogin {
    nonce: Nonce,
    issued: Instant,
}

/// Logins in flight, keyed by their `state` parameter.
type OidcStore = Arc<RwLock<HashMap<String, PendingLogin>>>;

#[derive(Clone, Debug)]
pub struct Authenticator {
    client: CoreClient,
    scopes: Vec<String>,
    login_ttl: Duration,
    store: OidcStore,
}

impl Authenticator {
    pub async fn discover(provider: ProviderConfig, app: &AppConfig) -> anyhow::Result<Self> {
        let provider_metadata = CoreProviderMetadata::discover_async(
            IssuerUrl::new(provider.issuer_url.clone())?,
            async_http_client,
        )
        .await?;

        tracing::info!("discovered provider {}", provider.issuer_url);

        Self::from_metadata(provider, app, provider_metadata)
    }

    pub fn from_metadata(
        provider: ProviderConfig,
        app: &AppConfig,
        provider_metadata: CoreProviderMetadata,
    ) -> anyhow::Result<Self> {
        let redirect = format!("{}/callback", app.base_url.trim_end_matches('/'));

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(provider.client_id),
            Some(ClientSecret::new(provider.client_secret)),
        )
        .set_redirect_uri(RedirectUrl::new(redirect)?);

        Ok(Self {
            client,
            scopes: app.scopes.clone(),
            login_ttl: LOGIN_TTL,
            store: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn with_login_ttl(mut self, ttl: Duration) -> Self {
        self.login_ttl = ttl;
        self
    }

    pub async fn login_redirect_url(&self) -> Url {
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        );
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token, nonce) = request.url();

        let ttl = self.login_ttl;
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, pending| pending.issued.elapsed() < ttl);
        if store.len() < before {
            tracing::debug!("dropped {} abandoned logins", before - store.len());
        }
        store.insert(
            csrf_token.secret().to_owned(),
            PendingLogin {
                nonce,
                issued: Instant::now(),
            },
        );

        auth_url
    }

    /// Number of logins started but not yet completed.
    pub async fn pending_logins(&self) -> usize {
        self.store.read().await.len()
    }

    /// Completes a login. The `state` is consumed even when verification
    /// fails afterwards, so it can never be replayed.
    pub async fn verify_code(&self, state: String, code: String) -> Result<UserProfile, AppError> {
        let nonce = self
            .store
            .write()
            .await
            .remove(&state)
            .filter(|pending| pending.issued.elapsed() < self.login_ttl)
            .map(|pending| pending.nonce)
            .ok_or(AppError::UnknownState)?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| AppError::Verification(format!("code exchange: {}", e)))?;

        let id_token_verifier = self.client.id_token_verifier();
        let id_token = token_response
            .extra_fields()
            .id_token()
            .ok_or_else(|| AppError::Verification("provider returned no ID token".into()))?;
        let id_token_claims = id_token
            .claims(&id_token_verifier, &nonce)
            .map_err(|e| AppError::Verification(e.to_string()))?;

        if let Some(expected_access_token_hash) = id_token_claims.access_token_hash() {
            let alg = id_token
                .signing_alg()
                .map_err(|e| AppError::Verification(e.to_string()))?;
            let actual = AccessTokenHash::from_token(token_response.access_token(), &alg)
                .map_err(|e| AppError::Verification(e.to_string()))?;

            if actual != *expected_access_token_hash {
                return Err(AppError::Verification("access token hash mismatch".into()));
            }
        }

        Ok(UserProfile::from(id_token_claims))
    }
}

/// The logged-in user, as kept in the session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub subject: String,
    pub name: String,
    pub picture: Option<String>,
}

impl From<&CoreIdTokenClaims> for UserProfile {
    fn from(claims: &CoreIdTokenClaims) -> Self {
        let subject = claims.subject().as_str().to_string();
        let name = claims
            .name()
            .and_then(|n| n.get(None))
            .map(|n| n.to_string())
            .or_else(|| claims.preferred_username().map(|n| n.to_string()))
            .or_else(|| {
                claims
                    .nickname()
                    .and_then(|n| n.get(None))
                    .map(|n| n.to_string())
            })
            .unwrap_or_else(|| subject.clone());
        let picture = claims
            .picture()
            .and_then(|p| p.get(None))
            .map(|url| url.to_string());

        Self {
            subject,
            name,
            picture,
        }
    }
}
