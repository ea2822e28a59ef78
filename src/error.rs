use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// RepoError
///
/// Failure raised by a store implementation. Constraint violations are split
/// out so both backends report them the same way; everything else is the
/// driver error, untouched.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("constraint `{0}` violated")]
    Constraint(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        let constraint = err
            .as_database_error()
            .and_then(|db| db.constraint())
            .map(str::to_string);
        match constraint {
            Some(name) => RepoError::Constraint(name),
            None => RepoError::Database(err),
        }
    }
}

/// ServiceError
///
/// Every way a core operation can fail. Nothing is recovered internally: the
/// variant reaches the transport layer as-is and is mapped to a status there.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} with ID {id} was not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("Not authorized to perform requested action")]
    Forbidden,
    #[error("No Posts Were Found")]
    EmptyResult,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Invalid Credentials")]
    Unauthorized,
    #[error("store failure: {0}")]
    Store(#[from] RepoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn post_not_found(id: i32) -> Self {
        ServiceError::NotFound { entity: "Post", id }
    }

    pub fn user_not_found(id: i32) -> Self {
        ServiceError::NotFound { entity: "User", id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } | ServiceError::EmptyResult => StatusCode::NOT_FOUND,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            // Store details stay in the log.
            tracing::error!(error = %self, "request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
