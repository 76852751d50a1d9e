// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for a11yscan
//!
//! The taxonomy mirrors how failures travel through a scan:
//!
//! - [`ElementError`] - a single element could not be read. Rules treat this
//!   as a signal to degrade, never as a reason to abort.
//! - [`RuleError`] - one rule's check failed. Absorbed by the registry into
//!   an `incomplete` result row.
//! - [`FacadeError`] - the browser session or document is unusable. Fatal to
//!   the scan unless the variant is recoverable at family level.
//! - [`ScanError`] - the only errors that escape `run_scan`: input validation
//!   and fatal facade failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Session-level facade failure.
///
/// `Selector` and `Script` are recoverable at family level (the document is
/// still alive); the rest mean the session or document is gone.
#[derive(Error, Debug, Clone)]
pub enum FacadeError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser session lost: {0}")]
    Session(String),

    #[error("script execution failed: {0}")]
    Script(String),

    #[error("unsupported selector: {0}")]
    Selector(String),

    #[error("timed out after {timeout_ms}ms waiting for \"{selector}\"")]
    Timeout { selector: String, timeout_ms: u64 },
}

impl FacadeError {
    /// Whether this failure kills the whole scan, as opposed to one family.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FacadeError::Navigation(_) | FacadeError::Session(_) | FacadeError::Timeout { .. }
        )
    }
}

/// Per-element read failure. Expected during normal operation.
#[derive(Error, Debug, Clone)]
pub enum ElementError {
    #[error("element no longer present in the document")]
    Detached,

    #[error("element not found")]
    NotFound,

    #[error("attribute \"{0}\" missing")]
    AttributeMissing(String),

    #[error("computed style unavailable for \"{0}\"")]
    StyleUnavailable(String),
}

/// Failure raised by a rule's check function.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Facade(#[from] FacadeError),

    #[error("{0}")]
    Check(String),
}

impl RuleError {
    pub fn check(msg: impl Into<String>) -> Self {
        RuleError::Check(msg.into())
    }
}

/// Errors that escape the engine to the caller.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan target: {0}")]
    Validation(String),

    #[error("scan failed during {stage}: {source}")]
    Facade {
        stage: &'static str,
        #[source]
        source: FacadeError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
