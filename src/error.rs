// Error taxonomy shared by every core operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// The four expected, caller-recoverable outcomes plus the two unexpected
/// infrastructure failures. Callers match on the variant to distinguish
/// "your request was invalid" from "the system is unhealthy".
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cache error: {0}")]
    Cache(String),
}

impl CoreError {
    /// Shorthand for a NotFound with a displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error is one of the expected request-level outcomes
    /// (as opposed to an infrastructure failure).
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound { .. }
                | CoreError::Validation(_)
                | CoreError::Conflict(_)
                | CoreError::PermissionDenied(_)
        )
    }
}
