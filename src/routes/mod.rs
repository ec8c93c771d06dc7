use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};

use crate::{error::ErrorResponse, state::AppState};

pub mod admin;
pub mod auth;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payment;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/orders", orders::router())
        .nest("/payment", payment::router())
        .nest("/admin", admin::router())
}

/// Health check, `/api`, the API reference and the 404 fallback.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(doc::scalar_docs())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    let body = ErrorResponse::new("Not Found", Some(format!("no route for {}", uri.path())));
    (StatusCode::NOT_FOUND, Json(body))
}
