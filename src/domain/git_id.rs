//! Git identifiers - the reconciliation key between a local definition and a remote resource

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum length for git ids
pub const MAX_GIT_ID_LENGTH: usize = 128;

/// Alphanumeric start, then alphanumerics, dots, underscores or hyphens
static GIT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap());

/// Git id validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum GitIdValidationError {
    EmptyId,
    IdTooLong { length: usize, max: usize },
    InvalidIdFormat { id: String },
}

impl fmt::Display for GitIdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Git id cannot be empty"),
            Self::IdTooLong { length, max } => {
                write!(f, "Git id too long: {} characters (max {})", length, max)
            }
            Self::InvalidIdFormat { id } => write!(
                f,
                "Invalid git id format '{}': must start alphanumeric and contain only alphanumerics, '.', '_' or '-'",
                id
            ),
        }
    }
}

impl std::error::Error for GitIdValidationError {}

pub fn validate_git_id(id: &str) -> Result<(), GitIdValidationError> {
    if id.is_empty() {
        return Err(GitIdValidationError::EmptyId);
    }

    if id.len() > MAX_GIT_ID_LENGTH {
        return Err(GitIdValidationError::IdTooLong {
            length: id.len(),
            max: MAX_GIT_ID_LENGTH,
        });
    }

    if !GIT_ID_PATTERN.is_match(id) {
        return Err(GitIdValidationError::InvalidIdFormat { id: id.to_string() });
    }

    Ok(())
}

/// Stable identifier embedded in a YAML definition.
///
/// At most one remote resource exists per git id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitId(String);

impl GitId {
    pub fn new(id: impl Into<String>) -> Result<Self, GitIdValidationError> {
        let id = id.into();
        validate_git_id(&id)?;
        Ok(Self(id))
    }

    /// A fresh id of the form `<prefix>-<uuid>`
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GitId {
    type Error = GitIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GitId> for String {
    fn from(id: GitId) -> Self {
        id.0
    }
}

impl AsRef<str> for GitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_id_valid() {
        let id = GitId::new("deployment-id-65a1.b_2").unwrap();
        assert_eq!(id.as_str(), "deployment-id-65a1.b_2");
    }

    #[test]
    fn test_git_id_invalid_chars() {
        assert_eq!(
            GitId::new("my model!"),
            Err(GitIdValidationError::InvalidIdFormat {
                id: "my model!".to_string()
            })
        );
        assert!(GitId::new("-leading-hyphen").is_err());
    }

    #[test]
    fn test_git_id_too_long() {
        let result = GitId::new("a".repeat(MAX_GIT_ID_LENGTH + 1));
        assert!(matches!(result, Err(GitIdValidationError::IdTooLong { .. })));
    }

    #[test]
    fn test_git_id_empty() {
        assert_eq!(GitId::new(""), Err(GitIdValidationError::EmptyId));
    }

    #[test]
    fn test_generated_ids_are_unique_and_valid() {
        let a = GitId::generate("deployment-id");
        let b = GitId::generate("deployment-id");

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("deployment-id-"));
        assert!(validate_git_id(a.as_str()).is_ok());
    }

    #[test]
    fn test_git_id_deserialize_validates() {
        let ok: Result<GitId, _> = serde_json::from_str("\"model-1\"");
        assert!(ok.is_ok());

        let bad: Result<GitId, _> = serde_json::from_str("\"bad id\"");
        assert!(bad.is_err());
    }
}
