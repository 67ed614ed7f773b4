use social_logout::{server::start_server, AppConfig, ProviderConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_logout=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let provider = envy::prefixed("OIDC_")
        .from_env::<ProviderConfig>()
        .map_err(|e| anyhow::anyhow!("failed reading OIDC_* settings: {}", e))?;
    let config = envy::prefixed("APP_")
        .from_env::<AppConfig>()
        .map_err(|e| anyhow::anyhow!("failed reading APP_* settings: {}", e))?;

    start_server(provider, config).await?;

    Ok(())
}
