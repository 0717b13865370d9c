use std::net::SocketAddr;

use credo_api::{build_router, AppState, Settings};
use credo_store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    let store = Store::open(&settings.database_path)?;

    let addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port).parse()?;
    let state = AppState::new(settings, store);
    let app = build_router(state);

    tracing::info!(%addr, "credo authority listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
