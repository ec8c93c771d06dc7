use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::payment::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Duplicate order number")]
    DuplicateOrderNumber,

    #[error("Payment temporarily unavailable")]
    PaymentUnavailable(String),

    #[error("Payment rejected: {reason}")]
    PaymentRejected {
        reason: String,
        code: Option<String>,
    },

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { reason, code } => AppError::PaymentRejected { reason, code },
            GatewayError::InvalidRequest(detail) => AppError::BadRequest(detail),
            other => AppError::PaymentUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error,
            code: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DuplicateOrderNumber => StatusCode::CONFLICT,
            AppError::PaymentUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PaymentRejected { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Storage and internal details stay in the logs.
        let (message, error, code) = match &self {
            AppError::BadRequest(detail) => (self.to_string(), Some(detail.clone()), None),
            AppError::PaymentUnavailable(detail) => {
                tracing::warn!(error = %detail, "payment gateway unavailable");
                (self.to_string(), None, None)
            }
            AppError::PaymentRejected { reason, code } => {
                ("Payment rejected".to_string(), Some(reason.clone()), code.clone())
            }
            AppError::DbError(err) => {
                tracing::error!(error = %err, "database error");
                (self.to_string(), None, None)
            }
            AppError::OrmError(err) => {
                tracing::error!(error = %err, "orm error");
                (self.to_string(), None, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (self.to_string(), None, None)
            }
            _ => (self.to_string(), Some(self.to_string()), None),
        };

        let body = ErrorResponse {
            success: false,
            message,
            error,
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
