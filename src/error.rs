use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::{DirectoryError, StoreError};

/// Errors surfaced by the matching engine
///
/// Every variant maps to a stable machine-readable code so clients can branch
/// on the kind of failure.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User {0} has no active travel plan")]
    NoActivePlan(uuid::Uuid),

    #[error("Cannot send a match request to yourself")]
    SelfRequest,

    #[error("A pending match request to this user already exists")]
    DuplicateRequest,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Match request {0} has already been responded to")]
    AlreadyResponded(uuid::Uuid),

    #[error("Match request {0} is not an accepted match")]
    NotAccepted(uuid::Uuid),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MatchError {
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::Validation(_) => "VALIDATION_ERROR",
            MatchError::NotFound(_) => "NOT_FOUND",
            MatchError::NoActivePlan(_) => "NO_ACTIVE_PLAN",
            MatchError::SelfRequest => "SELF_REQUEST",
            MatchError::DuplicateRequest => "DUPLICATE_REQUEST",
            MatchError::Forbidden(_) => "FORBIDDEN",
            MatchError::AlreadyResponded(_) => "ALREADY_RESPONDED",
            MatchError::NotAccepted(_) => "NOT_ACCEPTED",
            MatchError::Conflict(_) => "CONFLICT",
            MatchError::Unauthorized(_) => "UNAUTHORIZED",
            MatchError::Upstream(_) => "UPSTREAM_ERROR",
            MatchError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StoreError> for MatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => MatchError::NotFound(what),
            StoreError::Duplicate => MatchError::DuplicateRequest,
            StoreError::Conflict(what) => MatchError::Conflict(what),
            StoreError::InvalidInput(what) => MatchError::Validation(what),
            other => MatchError::Storage(other.to_string()),
        }
    }
}

impl From<DirectoryError> for MatchError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound(id) => MatchError::NotFound(format!("user {}", id)),
            other => MatchError::Upstream(other.to_string()),
        }
    }
}

impl ResponseError for MatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            MatchError::Validation(_)
            | MatchError::SelfRequest => StatusCode::BAD_REQUEST,
            MatchError::NotFound(_) | MatchError::NoActivePlan(_) => StatusCode::NOT_FOUND,
            MatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            MatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MatchError::DuplicateRequest
            | MatchError::AlreadyResponded(_)
            | MatchError::NotAccepted(_)
            | MatchError::Conflict(_) => StatusCode::CONFLICT,
            MatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            MatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}
