use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error, status={status}")]
    HttpStatus { status: u16 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("request failed after {attempts} attempt(s): {source}")]
    RequestFailed {
        attempts: u32,
        #[source]
        source: Box<CareError>,
    },
    #[error("request cancelled by caller")]
    Cancelled,
    #[error("request attempt exceeded caller deadline of {}ms", .0.as_millis())]
    AttemptTimedOut(Duration),

    #[error("failed to serialize JSON: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize JSON: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
}

impl CareError {
    /// Whether the retrying fetch helper may try again after this error.
    ///
    /// Every HTTP status failure and every transport failure is retryable. Caller-initiated
    /// cancellation and caller deadlines are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CareError::HttpStatus { .. } | CareError::Transport(_))
    }

    /// The HTTP status behind this error, looking through `RequestFailed`.
    pub fn status(&self) -> Option<u16> {
        match self {
            CareError::HttpStatus { status } => Some(*status),
            CareError::RequestFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_names_code() {
        let err = CareError::HttpStatus { status: 503 };
        assert_eq!(err.to_string(), "HTTP error, status=503");
    }

    #[test]
    fn test_request_failed_carries_last_cause() {
        let err = CareError::RequestFailed {
            attempts: 4,
            source: Box::new(CareError::HttpStatus { status: 429 }),
        };
        assert!(err.to_string().contains("after 4 attempt(s)"));
        assert!(err.to_string().contains("HTTP error, status=429"));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_cancellation_is_not_retryable() {
        assert!(!CareError::Cancelled.is_retryable());
        assert!(!CareError::AttemptTimedOut(Duration::from_millis(10)).is_retryable());
        assert!(CareError::Transport("reset".into()).is_retryable());
        assert!(CareError::HttpStatus { status: 400 }.is_retryable());
    }
}
