//! Error types for the suggestion-oracle boundary

use thiserror::Error;

/// Oracle error enumeration
///
/// Every variant is a fall-through signal to the resolver: a failed or
/// malformed oracle answer never aborts a step, it hands control to
/// the next tier.
#[derive(Debug, Error, Clone)]
pub enum OracleError {
    /// No oracle configured (missing API key).
    #[error("Oracle disabled: {0}")]
    Disabled(String),

    /// Transport-level failure.
    #[error("Oracle HTTP error: {0}")]
    Http(String),

    /// Non-success status from the oracle API.
    #[error("Oracle API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response did not match the expected shape.
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = OracleError::Api {
            status: 429,
            message: "quota".into(),
        };
        assert_eq!(err.to_string(), "Oracle API error (429): quota");
    }
}
