//! Error taxonomy of the optimizer core.
//!
//! Errors carry a category so that callers only catch what they can act on:
//! [`OptError::NoPlanFound`] signals fallback to an alternate planner,
//! [`OptError::ResourceExhausted`] truncates search, everything else
//! propagates to the top-level optimize call.

use thiserror::Error;

pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Error)]
pub enum OptError {
    /// Search completed but no cost context satisfies the root requirement.
    /// Recoverable; the caller is expected to fall back to another planner.
    #[error("no plan found satisfying required properties: {0}")]
    NoPlanFound(String),

    /// The input contains a construct with no operator or rule coverage.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// A search budget (xform applications, stack depth) was exceeded.
    #[error("resource budget exceeded: {0}")]
    ResourceExhausted(String),

    /// Invariant violation inside the optimizer. Fatal, never caught below
    /// the top level.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OptError {
    pub fn internal(msg: impl Into<String>) -> Self {
        OptError::Internal(anyhow::anyhow!(msg.into()))
    }

    /// Whether the error is one the caller may recover from by falling back
    /// to a different planner.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OptError::NoPlanFound(_) | OptError::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_categories() {
        assert!(OptError::NoPlanFound("order on c1".to_string()).is_recoverable());
        assert!(OptError::Unsupported("outer join".to_string()).is_recoverable());
        assert!(!OptError::internal("re-entrant group merge").is_recoverable());
        assert!(!OptError::ResourceExhausted("xform budget".to_string()).is_recoverable());
    }
}
