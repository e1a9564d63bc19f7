//! Verification errors

use thiserror::Error;

use crate::domain::DomainError;

/// Failure of a verification run
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Remote state differs from what the event should have produced
    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("{what} not found")]
    Missing { what: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<std::io::Error> for VerificationError {
    fn from(e: std::io::Error) -> Self {
        Self::Domain(e.into())
    }
}

impl VerificationError {
    pub fn mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::Mismatch {
            what: what.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        Self::Missing { what: what.into() }
    }
}

/// Fails with [`VerificationError::Mismatch`] unless `expected == actual`
pub fn ensure_eq<T>(what: &str, expected: T, actual: T) -> Result<(), VerificationError>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(VerificationError::mismatch(what, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_eq() {
        assert!(ensure_eq("label", "a", "a").is_ok());

        let err = ensure_eq("label", "a", "b").unwrap_err();
        assert_eq!(err.to_string(), "label: expected \"a\", got \"b\"");
    }

    #[test]
    fn test_platform_errors_convert() {
        let err: VerificationError = DomainError::illegal_deletion("in use").into();
        assert!(matches!(err, VerificationError::Domain(_)));
    }
}
