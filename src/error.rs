use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order belongs to another user")]
    OrderNotOwned,

    #[error("Order already paid")]
    OrderAlreadyPaid,

    #[error("Order cannot be paid in its current status")]
    OrderNotPayable,

    /// Business decline reported by the gateway; the message is shown verbatim.
    #[error("{0}")]
    GatewayRejected(String),

    /// No usable answer from the gateway. The payment may still have succeeded.
    #[error("Payment gateway unavailable")]
    GatewayUnavailable(String),

    #[error("Failed to create payment preference")]
    PreferenceFailed,

    #[error("Storage error")]
    Storage(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound | AppError::OrderNotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::OrderAlreadyPaid
            | AppError::OrderNotPayable
            | AppError::GatewayRejected(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::OrderNotOwned => StatusCode::FORBIDDEN,
            AppError::GatewayUnavailable(detail) => {
                tracing::error!(detail = %detail, "gateway unavailable");
                StatusCode::BAD_GATEWAY
            }
            AppError::PreferenceFailed => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = self.to_string();

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData { error: message }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
