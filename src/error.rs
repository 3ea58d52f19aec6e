use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::amount::AmountError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<eyre::Report> for ApiError {
    fn from(err: eyre::Report) -> Self {
        ApiError::Storage(format!("{:#}", err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Amount(_) | ApiError::Address(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
