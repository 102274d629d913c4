use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{auth::token::TokenError, response::failure};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing access_token!")]
    Unauthenticated,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unknown route <{route}> for method <{method}>!")]
    UnknownRoute { method: String, route: String },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error")]
    Storage(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::AuthenticationFailed(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) | AppError::UnknownRoute { .. } => StatusCode::NOT_FOUND,
            AppError::Token(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(e) => error!(error = %e, "storage failure"),
            AppError::Token(e) => error!(error = %e, "token failure escaped the guard"),
            AppError::Internal(e) => error!(error = ?e, "internal failure"),
            _ => {}
        }
        failure(self.status(), self.to_string())
    }
}
