use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = settings::ServerSettings::from_env()?;
    let app = api::build_router();

    tracing::info!("Starting math server on {}", settings.bind);
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
