use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    routing::post,
};

use crate::{
    audit::log_rejected_callback,
    dto::payment::CallbackPayload,
    middleware::client_ip::ClientIp,
    services::payment_callback_service::{ACKNOWLEDGEMENT, CallbackOutcome, process_callback},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(payment_callback))
}

/// Always answers `200 OK`; the gateway keeps retrying anything else.
#[utoipa::path(
    post,
    path = "/api/payment/callback",
    request_body(content = CallbackPayload, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Callback acknowledged", body = String, content_type = "text/plain"),
    ),
    tag = "Payment"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    form: Result<Form<CallbackPayload>, FormRejection>,
) -> (StatusCode, &'static str) {
    let payload = match form {
        Ok(Form(payload)) => payload,
        Err(rejection) => {
            tracing::warn!(
                target: "security",
                ip = %client_ip,
                error = %rejection,
                "unreadable payment callback body"
            );
            log_rejected_callback(&state.pool, "", &client_ip).await;
            return (StatusCode::OK, ACKNOWLEDGEMENT);
        }
    };

    let outcome = process_callback(&state.orders, &payload).await;
    if let CallbackOutcome::InvalidSignature { order_number } = &outcome {
        log_rejected_callback(&state.pool, order_number, &client_ip).await;
    }
    tracing::debug!(outcome = ?outcome, "payment callback processed");

    (StatusCode::OK, ACKNOWLEDGEMENT)
}
