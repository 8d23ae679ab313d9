//! Import errors
//!
//! Two classes of failure share one channel: expected structural errors
//! (`Syntax`, `Unsupported`, `Resolution`) and invariant violations
//! (`Internal`). Builds are fail-fast; the public entry point wraps the
//! first failure into the error list the API promises.

use schemasketch_core::UnresolvedCte;
use thiserror::Error;

/// A single import failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The grammatical parser rejected the SQL text
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A recognized but deliberately unsupported construct
    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    /// A name or scope resolution failure
    #[error("{0}")]
    Resolution(String),

    /// An invariant violation inside the importer
    #[error("internal error: {0}")]
    Internal(String),
}

impl ImportError {
    /// Shorthand for an [`ImportError::Unsupported`] with a formatted message.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Shorthand for an [`ImportError::Resolution`] with a formatted message.
    pub fn resolution(what: impl Into<String>) -> Self {
        Self::Resolution(what.into())
    }

    /// Whether this is an expected structural failure rather than an
    /// importer bug.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<UnresolvedCte> for ImportError {
    fn from(err: UnresolvedCte) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result alias used throughout the builders.
pub type BuildResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_distinguishable() {
        assert!(ImportError::unsupported("HAVING").is_structural());
        assert!(ImportError::resolution("unknown source 'x'").is_structural());
        assert!(!ImportError::Internal("slot".into()).is_structural());
    }

    #[test]
    fn unresolved_cte_converts_to_internal() {
        let err: ImportError = UnresolvedCte {
            name: schemasketch_core::NameKey::new("r"),
        }
        .into();
        assert!(matches!(err, ImportError::Internal(_)));
    }
}
