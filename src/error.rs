use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not configured")]
    Misconfigured(&'static str),

    #[error("Upstream model failure: {0}")]
    Upstream(#[from] ModelError),

    #[error("Generation exceeded the maximum duration")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Misconfigured(_) | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Upstream and internal details stay in the log.
        let body = match self {
            AppError::Unauthorized | AppError::Misconfigured(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        };
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(body)
    }
}
