// Typed errors with thiserror. Internal diagnostics: the host never sees these as errors.
// See DESIGN.md: error

use thiserror::Error;

/// Control error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid animation source: {0}")]
    InvalidSource(String),

    #[error("Invalid frame range: {0}")]
    InvalidFrameRange(String),

    #[error("Fetching {url} failed on attempt {attempt}: {message}")]
    FetchFailed {
        url: String,
        attempt: u32,
        message: String,
    },

    #[error("Engine creation failed: {0}")]
    EngineCreation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ControlError::FetchFailed {
            url: "https://example.com/a.json".to_string(),
            attempt: 2,
            message: "timeout".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("attempt 2"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn serde_errors_convert() {
        let err: ControlError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ControlError::Serialization(_)));
    }
}
