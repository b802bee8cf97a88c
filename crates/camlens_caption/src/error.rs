//! Error types for camlens_caption.

use thiserror::Error;

/// Result type alias using [`CaptionError`].
pub type Result<T> = std::result::Result<T, CaptionError>;

/// Errors raised while producing captions.
#[derive(Error, Debug)]
pub enum CaptionError {
    /// The service could not be reached or the connection failed.
    #[error("HTTP request to {url} failed: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {code} from {url}")]
    Status {
        /// Status code.
        code: u16,
        /// Requested URL.
        url: String,
    },

    /// The reply body was not the expected JSON.
    #[error("Failed to decode reply: {0}")]
    Decode(String),

    /// Predictions and labels have different lengths.
    #[error("{predictions} predictions for {labels} labels")]
    LengthMismatch {
        /// Number of predictions.
        predictions: usize,
        /// Number of labels.
        labels: usize,
    },
}

impl CaptionError {
    pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => Self::Status {
                code,
                url: url.to_string(),
            },
            ureq::Error::Transport(transport) => Self::Http {
                url: url.to_string(),
                message: transport.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptionError::Status {
            code: 503,
            url: "http://localhost:11434/api/generate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503 from http://localhost:11434/api/generate"
        );

        let err = CaptionError::LengthMismatch {
            predictions: 2,
            labels: 3,
        };
        assert_eq!(err.to_string(), "2 predictions for 3 labels");
    }
}
