//! Custom model definition as declared in a local YAML file

use serde::{Deserialize, Serialize};

use crate::domain::schema::SchemaDocument;
use crate::domain::{DomainError, GitId};

/// One megabyte as used for model memory settings
pub const ONE_MB: u64 = 1024 * 1024;

/// Memory assigned to a model that does not declare any
pub const DEFAULT_MODEL_MEMORY: u64 = 256 * ONE_MB;

/// Prediction target type of a custom model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    Binary,
    Regression,
    Multiclass,
    Unstructured,
}

/// Resource and naming settings of a custom model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Display name of the custom model
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Memory in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

/// Version-level settings of a custom model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelVersionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_environment_id: Option<String>,
}

/// A custom model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub git_model_id: GitId,

    pub target_type: TargetType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    pub settings: ModelSettings,

    #[serde(default)]
    pub version: ModelVersionSettings,
}

impl ModelDefinition {
    pub fn new(git_model_id: GitId, target_type: TargetType, name: impl Into<String>) -> Self {
        Self {
            git_model_id,
            target_type,
            target_name: None,
            settings: ModelSettings {
                name: name.into(),
                description: None,
                memory: None,
                replicas: None,
            },
            version: ModelVersionSettings::default(),
        }
    }

    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    pub fn with_memory(mut self, memory: u64) -> Self {
        self.settings.memory = Some(memory);
        self
    }

    pub fn from_document(doc: &SchemaDocument) -> Result<Self, DomainError> {
        let definition: Self = serde_yaml::from_value(doc.as_value().clone())?;
        super::validate_model_definition(&definition)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        Ok(definition)
    }

    pub fn to_document(&self) -> Result<SchemaDocument, DomainError> {
        SchemaDocument::from_value(serde_yaml::to_value(self)?)
    }

    pub fn memory(&self) -> u64 {
        self.settings.memory.unwrap_or(DEFAULT_MODEL_MEMORY)
    }

    pub fn replicas(&self) -> u32 {
        self.settings.replicas.unwrap_or(1)
    }
}
