//! Route definitions for the stock ledger server

use axum::{middleware, routing::get, Router};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - ledger reads
        .nest("/ledger", ledger_routes(state))
}

/// Ledger timeline and summary routes (protected)
fn ledger_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/products/:product_code/timeline",
            get(handlers::get_product_timeline),
        )
        .route(
            "/products/:product_code/stock",
            get(handlers::get_current_stock),
        )
        .route("/timeline", get(handlers::get_timeline_by_query))
        .route("/summary", get(handlers::get_movement_summary))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
