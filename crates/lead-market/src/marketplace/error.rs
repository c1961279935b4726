use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use super::store::StoreError;

/// Uniqueness or exclusivity rule a request collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    AlreadyApplied,
    AlreadyAccepted,
    ProfileCompleted,
}

impl ConflictReason {
    pub const fn code(self) -> &'static str {
        match self {
            ConflictReason::AlreadyApplied => "already_applied",
            ConflictReason::AlreadyAccepted => "already_accepted",
            ConflictReason::ProfileCompleted => "profile_already_completed",
        }
    }

    const fn message(self) -> &'static str {
        match self {
            ConflictReason::AlreadyApplied => "you have already applied to this lead",
            ConflictReason::AlreadyAccepted => {
                "another application has already been accepted for this lead"
            }
            ConflictReason::ProfileCompleted => "profile has already been completed",
        }
    }
}

/// Failure taxonomy surfaced by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),
    #[error("no authentication token provided")]
    Unauthenticated,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{}", .0.message())]
    Conflict(ConflictReason),
    #[error("this lead has reached the maximum of {limit} applications")]
    CapacityExceeded { limit: usize },
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("failed to update user credits: {0}")]
    CreditUpdateFailed(#[source] StoreError),
    #[error("payment signature does not match")]
    InvalidSignature,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarketError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "validation_error",
            MarketError::Unauthenticated => "unauthenticated",
            MarketError::InvalidToken(_) => "invalid_token",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::NotFound(_) => "not_found",
            MarketError::Conflict(reason) => reason.code(),
            MarketError::CapacityExceeded { .. } => "capacity_exceeded",
            MarketError::InsufficientFunds { .. } => "insufficient_funds",
            MarketError::CreditUpdateFailed(_) => "credit_update_failed",
            MarketError::InvalidSignature => "invalid_signature",
            MarketError::Store(_) => "store_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MarketError::Validation(_)
            | MarketError::CapacityExceeded { .. }
            | MarketError::InvalidSignature => StatusCode::BAD_REQUEST,
            MarketError::Unauthenticated | MarketError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Conflict(_) => StatusCode::CONFLICT,
            MarketError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            MarketError::CreditUpdateFailed(_) | MarketError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        body.insert("error".to_string(), json!(self.code()));
        body.insert("message".to_string(), json!(self.to_string()));

        match &self {
            MarketError::CapacityExceeded { .. } => {
                body.insert("maxReached".to_string(), Value::Bool(true));
            }
            MarketError::InsufficientFunds {
                required,
                available,
            } => {
                body.insert("requiredCredits".to_string(), json!(required));
                body.insert("availableCredits".to_string(), json!(available));
            }
            _ => {}
        }

        (status, Json(Value::Object(body))).into_response()
    }
}
