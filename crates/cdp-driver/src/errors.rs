//! Error types for the browser driver boundary

use thiserror::Error;

/// Driver error enumeration
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    /// Browser process failed to launch
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation failed or timed out
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// In-page script evaluation failed
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Click/fill/select interaction failed
    #[error("Interaction failed at '{address}': {reason}")]
    Interaction { address: String, reason: String },

    /// Screenshot capture failed
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// Operation exceeded its timeout
    #[error("Driver timeout: {0}")]
    Timeout(String),

    /// Session already closed or browser gone
    #[error("Session closed: {0}")]
    Closed(String),
}

impl DriverError {
    /// Whether the whole browser session is unusable after this error.
    ///
    /// Session-fatal errors surface to the retry controller as a
    /// recoverable attempt failure (new session, new identity);
    /// non-fatal ones are swallowed by per-candidate loops.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Launch(_)
                | DriverError::Navigation(_)
                | DriverError::Closed(_)
                | DriverError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classes() {
        assert!(DriverError::Launch("no chrome".into()).is_session_fatal());
        assert!(DriverError::Navigation("dns".into()).is_session_fatal());
        assert!(!DriverError::Interaction {
            address: "#a".into(),
            reason: "covered".into()
        }
        .is_session_fatal());
        assert!(!DriverError::Evaluation("syntax".into()).is_session_fatal());
    }
}
