pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod service;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{
    apply_query, apply_to_single, parse_filter, FilterExpr, QueryError, QueryOptions, QueryOutcome,
    QueryParams, MAX_PAGE_SIZE,
};

// Export all model types
pub use model::*;

// Export service types
pub use service::ProductService;

// Export store types
pub use store::{CategoryStore, MemoryStore, ProductStore, Store};

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;

    let store = Arc::new(crate::store::MemoryStore::new());
    crate::seed::load_seed_data(&*store).await?;

    let app = crate::api::routes::create_router().with_state(store);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
