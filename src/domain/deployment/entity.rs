//! Deployment definition as declared in a local YAML file

use serde::{Deserialize, Serialize};

use crate::domain::schema::SchemaDocument;
use crate::domain::{DomainError, GitId};

fn default_true() -> bool {
    true
}

/// Deployment importance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importance {
    Critical,
    High,
    Moderate,
    Low,
}

/// Segment analysis settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// Association id and actuals settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Prediction column holding the association id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_id_column: Option<String>,

    #[serde(default)]
    pub required_in_prediction_requests: bool,

    /// Actuals dataset column holding the association id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuals_id_column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_values_column: Option<String>,

    /// Dataset whose rows are submitted as actuals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuals_dataset_id: Option<String>,
}

/// Deployment settings section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,

    #[serde(default = "default_true")]
    pub enable_target_drift: bool,

    #[serde(default)]
    pub enable_feature_drift: bool,

    #[serde(default)]
    pub segment_analysis: SegmentAnalysis,

    #[serde(default = "default_true")]
    pub enable_challenger_models: bool,

    #[serde(default = "default_true")]
    pub enable_predictions_collection: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<Association>,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            label: None,
            description: None,
            importance: None,
            enable_target_drift: true,
            enable_feature_drift: false,
            segment_analysis: SegmentAnalysis::default(),
            enable_challenger_models: true,
            enable_predictions_collection: true,
            association: None,
        }
    }
}

/// A deployment definition referencing exactly one custom model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    pub git_deployment_id: GitId,

    pub git_model_id: GitId,

    #[serde(default)]
    pub settings: DeploymentSettings,
}

impl DeploymentDefinition {
    pub fn new(git_deployment_id: GitId, git_model_id: GitId) -> Self {
        Self {
            git_deployment_id,
            git_model_id,
            settings: DeploymentSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DeploymentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn from_document(doc: &SchemaDocument) -> Result<Self, DomainError> {
        let definition: Self = serde_yaml::from_value(doc.as_value().clone())?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn to_document(&self) -> Result<SchemaDocument, DomainError> {
        SchemaDocument::from_value(serde_yaml::to_value(self)?)
    }

    /// Declared label, falling back to the git deployment id
    pub fn label(&self) -> &str {
        self.settings
            .label
            .as_deref()
            .unwrap_or(self.git_deployment_id.as_str())
    }

    pub fn actuals_dataset_id(&self) -> Option<&str> {
        self.settings
            .association
            .as_ref()
            .and_then(|a| a.actuals_dataset_id.as_deref())
    }

    fn validate(&self) -> Result<(), DomainError> {
        if let Some(label) = &self.settings.label {
            if label.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "Deployment '{}' has an empty label",
                    self.git_deployment_id
                )));
            }
        }

        if let Some(association) = &self.settings.association {
            if association.actuals_dataset_id.is_some() && association.actuals_id_column.is_none()
            {
                return Err(DomainError::validation(format!(
                    "Deployment '{}' declares an actuals dataset without an actuals id column",
                    self.git_deployment_id
                )));
            }
        }

        Ok(())
    }
}
