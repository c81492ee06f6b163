//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

/// Upstream bodies are truncated to this many characters in errors and logs.
const MAX_BODY_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum DomainError {
    /// CRM answered with a non-2xx status.
    #[error("CRM {resource} request failed with status {status}: {body}")]
    Upstream {
        resource: &'static str,
        status: u16,
        body: String,
    },

    #[error("CRM transport error: {0}")]
    Transport(String),

    #[error("Failed to decode CRM response: {0}")]
    Decode(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Recording store error: {0}")]
    Store(String),

    #[error("UI error: {0}")]
    Ui(String),
}

impl DomainError {
    pub fn upstream(resource: &'static str, status: u16, body: &str) -> Self {
        Self::Upstream {
            resource,
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_truncates_body() {
        let long = "x".repeat(500);
        match DomainError::upstream("notes", 422, &long) {
            DomainError::Upstream { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body.len(), MAX_BODY_CHARS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_upstream_display_carries_status_and_text() {
        let err = DomainError::upstream("notes", 400, "contact not found");
        assert_eq!(
            err.to_string(),
            "CRM notes request failed with status 400: contact not found"
        );
    }
}
