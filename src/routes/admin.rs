use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};

use crate::{
    dto::orders::UpdateOrderRequest,
    error::{AppResult, ErrorResponse},
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/orders/{id}", patch(update_order))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_order(&state.orders, &user, id, payload).await?;
    Ok(Json(resp))
}
