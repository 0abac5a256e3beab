use axum::serve;
use catalog_api::api::routes::create_router;
use catalog_api::config::AppConfig;
use catalog_api::seed;
use catalog_api::store::MemoryStore;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!(
        "configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let store = Arc::new(MemoryStore::new());
    seed::load_seed_data(&*store).await?;

    run_server(create_router().with_state(store), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("catalog-api server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
