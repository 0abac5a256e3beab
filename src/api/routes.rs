use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Products entity set
        .route("/Products", get(handlers::list_products::<S>))
        .route("/Products", post(handlers::create_product::<S>))
        .route("/Products/:id", get(handlers::get_product::<S>))
        .route("/Products/:id", put(handlers::update_product::<S>))
        .route("/Products/:id", delete(handlers::delete_product::<S>))
        // Categories entity set (read-only)
        .route("/Categories", get(handlers::list_categories::<S>))
        .route("/Categories/:id", get(handlers::get_category::<S>))
        // Custom function and action
        .route(
            "/GetExpensiveProducts",
            get(handlers::get_expensive_products::<S>),
        )
        .route("/ResetPrices", post(handlers::reset_prices::<S>))
        .layer(CorsLayer::permissive())
}
