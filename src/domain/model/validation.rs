//! Model definition validation

use std::fmt;

use super::entity::{ModelDefinition, ONE_MB};

/// Smallest memory setting accepted by the platform
pub const MIN_MODEL_MEMORY: u64 = 128 * ONE_MB;

/// Model definition validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValidationError {
    /// Model name is empty
    EmptyName,
    /// Memory below the platform minimum
    InsufficientMemory { value: u64, min: u64 },
    /// Replicas is zero
    InvalidReplicas,
}

impl fmt::Display for ModelValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Model name cannot be empty"),
            Self::InsufficientMemory { value, min } => {
                write!(f, "Model memory {} is below the minimum of {} bytes", value, min)
            }
            Self::InvalidReplicas => write!(f, "replicas must be greater than 0"),
        }
    }
}

impl std::error::Error for ModelValidationError {}

pub fn validate_model_definition(model: &ModelDefinition) -> Result<(), ModelValidationError> {
    if model.settings.name.trim().is_empty() {
        return Err(ModelValidationError::EmptyName);
    }

    if let Some(memory) = model.settings.memory {
        if memory < MIN_MODEL_MEMORY {
            return Err(ModelValidationError::InsufficientMemory {
                value: memory,
                min: MIN_MODEL_MEMORY,
            });
        }
    }

    if model.settings.replicas == Some(0) {
        return Err(ModelValidationError::InvalidReplicas);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TargetType;
    use crate::domain::GitId;

    fn model() -> ModelDefinition {
        ModelDefinition::new(GitId::new("model-1").unwrap(), TargetType::Binary, "Model")
    }

    #[test]
    fn test_valid_model() {
        assert!(validate_model_definition(&model()).is_ok());
    }

    #[test]
    fn test_empty_name() {
        let mut m = model();
        m.settings.name = "  ".to_string();
        assert_eq!(
            validate_model_definition(&m),
            Err(ModelValidationError::EmptyName)
        );
    }

    #[test]
    fn test_low_memory() {
        let m = model().with_memory(ONE_MB);
        assert!(matches!(
            validate_model_definition(&m),
            Err(ModelValidationError::InsufficientMemory { .. })
        ));
    }

    #[test]
    fn test_zero_replicas() {
        let mut m = model();
        m.settings.replicas = Some(0);
        assert_eq!(
            validate_model_definition(&m),
            Err(ModelValidationError::InvalidReplicas)
        );
    }
}
