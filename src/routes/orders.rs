use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::{
        orders::{
            CreateOrderRequest, CreateOrderResponse, GuestTrackRequest, OrderList, OrderWithItems,
        },
        payment::PaymentSession,
    },
    error::{AppResult, ErrorResponse},
    middleware::{auth::AuthUser, client_ip::ClientIp},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/create-payment", post(create_payment))
        .route("/guest-track", post(guest_track))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, awaiting manual confirmation", body = CreateOrderResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Order number collision", body = ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<CreateOrderResponse>)> {
    let resp = order_service::create_order(&state.orders, user.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/orders/create-payment",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created and payment token issued", body = PaymentSession),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 402, description = "Gateway rejected the payment", body = ErrorResponse),
        (status = 503, description = "Gateway unavailable", body = ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    ClientIp(client_ip): ClientIp,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<PaymentSession>> {
    let resp =
        order_service::create_payment(&state.orders, user.as_ref(), payload, &client_ip).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/guest-track",
    request_body = GuestTrackRequest,
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "No order with this number and e-mail", body = ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn guest_track(
    State(state): State<AppState>,
    Json(payload): Json<GuestTrackRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::track_guest_order(&state.orders, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of the current customer", body = ApiResponse<OrderList>),
        (status = 400, description = "Invalid filter or token", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state.orders, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state.orders, &user, id).await?;
    Ok(Json(resp))
}
