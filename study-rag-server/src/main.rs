use study_rag_server::{ServerConfig, run_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,study_rag=debug")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    run_server(config).await
}
