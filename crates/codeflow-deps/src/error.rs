//! Error types for dependency analysis
//!
//! Analysis itself never fails: unresolved imports are reported through
//! [`ComplianceVerdict`](crate::ComplianceVerdict) and the missing-file list.
//! The errors here cover malformed project input only.

/// Errors raised while assembling a project for analysis
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DepsError {
    /// File path is empty after normalization
    #[error("empty file path")]
    EmptyPath,

    /// File path escapes the project root
    #[error("path escapes project root: {0}")]
    PathEscapesRoot(String),

    /// File path is absolute
    #[error("absolute path not allowed: {0}")]
    AbsolutePath(String),
}

impl DepsError {
    /// Offending path, if any
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::EmptyPath => None,
            Self::PathEscapesRoot(p) | Self::AbsolutePath(p) => Some(p),
        }
    }
}
