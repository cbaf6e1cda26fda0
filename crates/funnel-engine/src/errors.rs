//! Engine failure type: a `FailureKind` from the shared taxonomy plus
//! human-readable detail for the run log.

use thiserror::Error;

use cartprobe_core_types::FailureKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}: {detail}", kind.name())]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl EngineFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn captcha(marker: impl Into<String>) -> Self {
        Self::new(FailureKind::Captcha, marker)
    }

    pub fn login(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Login, detail)
    }

    pub fn no_selector(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::NoSelector, detail)
    }

    pub fn navigation(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Navigation, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, detail)
    }

    /// Whether the retry controller may rotate identity and retry.
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}
