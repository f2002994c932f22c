use minisocial::api;
use minisocial::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("minisocial=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    api::server::start_server(config).await
}
