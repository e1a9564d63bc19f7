//! Remote resources owned by the ML platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deployment::Importance;
use crate::domain::model::TargetType;

/// A custom model registered on the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModel {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_model_id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub target_type: TargetType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    pub created: DateTime<Utc>,
}

/// Git provenance recorded on a model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitModelVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,

    /// SHA-256 over the model definition and its directory
    pub content_digest: String,
}

/// One immutable version of a custom model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: String,
    pub custom_model_id: String,
    pub version_number: u32,
    pub memory: u64,
    pub replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_environment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_model_version: Option<GitModelVersion>,

    pub created: DateTime<Utc>,
}

impl ModelVersion {
    pub fn content_digest(&self) -> Option<&str> {
        self.git_model_version
            .as_ref()
            .map(|g| g.content_digest.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModelImage {
    pub custom_model_id: String,
    pub custom_model_version_id: String,
}

/// The model currently serving a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedModel {
    pub id: String,
    pub custom_model_image: CustomModelImage,
}

/// A deployment on the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_deployment_id: Option<String>,

    pub model: DeployedModel,
}

impl Deployment {
    /// Version id of the primary (serving) model
    pub fn model_version_id(&self) -> &str {
        &self.model.custom_model_image.custom_model_version_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengerModel {
    pub id: String,
}

/// A secondary model version attached to a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenger {
    pub id: String,
    pub name: String,
    pub model: ChallengerModel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledSetting {
    pub enabled: bool,
}

impl EnabledSetting {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAnalysisSetting {
    pub enabled: bool,

    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationIdSetting {
    #[serde(default)]
    pub column_names: Vec<String>,

    #[serde(default)]
    pub required_in_prediction_requests: bool,
}

/// Monitoring settings of a deployment as reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSettingsSnapshot {
    pub target_drift: EnabledSetting,
    pub feature_drift: EnabledSetting,
    pub segment_analysis: SegmentAnalysisSetting,
    pub challenger_models: EnabledSetting,
    pub predictions_data_collection: EnabledSetting,

    #[serde(default)]
    pub association_id: AssociationIdSetting,
}

/// A dataset uploaded to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub row_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_wire_format() {
        let json = serde_json::json!({
            "id": "64f0",
            "label": "Juniors",
            "gitDeploymentId": "deployment-1",
            "model": {
                "id": "pkg-1",
                "customModelImage": {
                    "customModelId": "cm-1",
                    "customModelVersionId": "cmv-2"
                }
            }
        });

        let deployment: Deployment = serde_json::from_value(json).unwrap();

        assert_eq!(deployment.git_deployment_id.as_deref(), Some("deployment-1"));
        assert_eq!(deployment.model_version_id(), "cmv-2");
        assert!(deployment.importance.is_none());
    }

    #[test]
    fn test_settings_wire_format() {
        let json = serde_json::json!({
            "targetDrift": {"enabled": true},
            "featureDrift": {"enabled": false},
            "segmentAnalysis": {"enabled": true, "attributes": ["team"]},
            "challengerModels": {"enabled": true},
            "predictionsDataCollection": {"enabled": true}
        });

        let settings: DeploymentSettingsSnapshot = serde_json::from_value(json).unwrap();

        assert!(settings.target_drift.enabled);
        assert!(!settings.feature_drift.enabled);
        assert_eq!(settings.segment_analysis.attributes, vec!["team"]);
        assert!(settings.association_id.column_names.is_empty());
    }
}
