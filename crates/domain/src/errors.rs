//! The error taxonomy of spec §7, with HTTP status code mappings in the
//! style of the teacher's `DomainError`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response format.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Planning-domain errors (spec §7). `SchedulePartialWarning` is
/// deliberately not a variant here: it never aborts an operation, so it is
/// carried as `String` entries in a scenario's `warnings` list instead.
#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    /// Bad input: missing field, unknown id, negative quantity (400).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Aggregated field-level validation failures (400).
    #[error("Validation failed")]
    ValidationErrors(Vec<String>),

    /// Multi-step BOM with no dependencies, inverted planning window,
    /// demand without a BOM, accepting a scenario that doesn't belong to
    /// the run (400, operation refused atomically).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// UNIQUE violation: duplicate certification, duplicate employee id,
    /// assignment already present on a block (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Fatal mid-run: circular dependency detected by the stuck-check
    /// (spec §4.5). The run is abandoned; no scenario is persisted (500).
    #[error("Schedule infeasible: {0}")]
    Infeasible(String),

    /// Repository failure, retried at the repository boundary; surfaced
    /// here only once retries are exhausted (500).
    #[error("Repository error: {0}")]
    Io(String),

    /// Catch-all for unexpected internal failures (500).
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl PlanningError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlanningError::Validation(_)
            | PlanningError::ValidationErrors(_)
            | PlanningError::Precondition(_) => StatusCode::BAD_REQUEST,
            PlanningError::NotFound(_) => StatusCode::NOT_FOUND,
            PlanningError::Conflict(_) => StatusCode::CONFLICT,
            PlanningError::Infeasible(_) | PlanningError::Io(_) | PlanningError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error
                            .message
                            .as_ref()
                            .unwrap_or(&std::borrow::Cow::Borrowed("validation failed"))
                    )
                })
            })
            .collect();

        if messages.is_empty() {
            PlanningError::Validation("Invalid input".to_string())
        } else {
            PlanningError::ValidationErrors(messages)
        }
    }
}

impl IntoResponse for PlanningError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if matches!(
            self,
            PlanningError::Infeasible(_) | PlanningError::Io(_) | PlanningError::Internal(_)
        ) {
            tracing::error!("Internal error: {}", self);
        }

        let body = match &self {
            PlanningError::ValidationErrors(details) => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(details.clone()),
            },
            _ => ErrorResponse {
                error: self.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
