use tracing_subscriber::EnvFilter;
use tutordesk::{AppState, Backend, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tutordesk=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let backend = Backend::firebase(&config.firebase)?;
    let bind_addr = config.bind_addr.clone();

    let app = tutordesk::app(AppState::new(backend, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
