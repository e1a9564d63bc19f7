//! Remote platform client trait and request types

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entity::{
    AssociationIdSetting, Challenger, CustomModel, Dataset, Deployment,
    DeploymentSettingsSnapshot, EnabledSetting, GitModelVersion, ModelVersion,
    SegmentAnalysisSetting,
};
use crate::domain::deployment::{DeploymentDefinition, Importance};
use crate::domain::model::{ModelDefinition, TargetType};
use crate::domain::{DomainError, GitId};

/// Request to register a custom model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomModelRequest {
    pub git_model_id: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub target_type: TargetType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

impl From<&ModelDefinition> for CreateCustomModelRequest {
    fn from(model: &ModelDefinition) -> Self {
        Self {
            git_model_id: model.git_model_id.to_string(),
            name: model.settings.name.clone(),
            description: model.settings.description.clone(),
            target_type: model.target_type,
            target_name: model.target_name.clone(),
        }
    }
}

/// Request to create a new custom model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelVersionRequest {
    pub memory: u64,
    pub replicas: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_environment_id: Option<String>,

    pub git_model_version: GitModelVersion,
}

/// Request to deploy a custom model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub git_deployment_id: String,
    pub custom_model_version_id: String,
    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
}

impl CreateDeploymentRequest {
    pub fn from_definition(
        deployment: &DeploymentDefinition,
        custom_model_version_id: impl Into<String>,
    ) -> Self {
        Self {
            git_deployment_id: deployment.git_deployment_id.to_string(),
            custom_model_version_id: custom_model_version_id.into(),
            label: deployment.label().to_string(),
            description: deployment.settings.description.clone(),
            importance: deployment.settings.importance,
        }
    }
}

/// Partial update of a deployment's monitoring settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_drift: Option<EnabledSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_drift: Option<EnabledSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_analysis: Option<SegmentAnalysisSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenger_models: Option<EnabledSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions_data_collection: Option<EnabledSetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_id: Option<AssociationIdSetting>,
}

impl DeploymentSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the settings this update touches
    pub fn changed_settings(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.target_drift.is_some() {
            names.push("target_drift");
        }
        if self.feature_drift.is_some() {
            names.push("feature_drift");
        }
        if self.segment_analysis.is_some() {
            names.push("segment_analysis");
        }
        if self.challenger_models.is_some() {
            names.push("challenger_models");
        }
        if self.predictions_data_collection.is_some() {
            names.push("predictions_data_collection");
        }
        if self.association_id.is_some() {
            names.push("association_id");
        }
        names
    }
}

/// Label, description and importance of a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
}

impl DeploymentInfoUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Actuals submission from an uploaded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualsFromDatasetRequest {
    pub dataset_id: String,
    pub association_id_column: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value_column: Option<String>,
}

/// Client for the remote ML platform.
///
/// Lookups by git id return `None` when no resource carries that id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync + std::fmt::Debug {
    async fn fetch_custom_models(&self) -> Result<Vec<CustomModel>, DomainError>;

    async fn fetch_custom_model_by_git_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<CustomModel>, DomainError>;

    async fn create_custom_model(
        &self,
        request: &CreateCustomModelRequest,
    ) -> Result<CustomModel, DomainError>;

    async fn create_custom_model_version(
        &self,
        custom_model_id: &str,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersion, DomainError>;

    async fn fetch_custom_model_latest_version_by_git_model_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<ModelVersion>, DomainError>;

    /// Fails with `IllegalDeletion` while a deployment uses the model
    async fn delete_custom_model_by_git_id(&self, git_model_id: &GitId)
    -> Result<bool, DomainError>;

    async fn fetch_deployments(&self) -> Result<Vec<Deployment>, DomainError>;

    async fn fetch_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<Option<Deployment>, DomainError>;

    async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<Deployment, DomainError>;

    async fn update_deployment_info(
        &self,
        deployment_id: &str,
        update: &DeploymentInfoUpdate,
    ) -> Result<Deployment, DomainError>;

    async fn replace_deployment_model(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
    ) -> Result<Deployment, DomainError>;

    async fn fetch_deployment_settings(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentSettingsSnapshot, DomainError>;

    async fn update_deployment_settings(
        &self,
        deployment_id: &str,
        update: &DeploymentSettingsUpdate,
    ) -> Result<DeploymentSettingsSnapshot, DomainError>;

    /// Challengers in creation order
    async fn fetch_challengers(&self, deployment_id: &str) -> Result<Vec<Challenger>, DomainError>;

    async fn add_challenger(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
        name: &str,
    ) -> Result<Challenger, DomainError>;

    async fn delete_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<bool, DomainError>;

    async fn upload_dataset(&self, path: &Path) -> Result<Dataset, DomainError>;

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), DomainError>;

    async fn submit_actuals_from_dataset(
        &self,
        deployment_id: &str,
        request: &ActualsFromDatasetRequest,
    ) -> Result<(), DomainError>;

    /// Ids of the datasets already submitted as actuals
    async fn fetch_actuals_dataset_ids(&self, deployment_id: &str)
    -> Result<Vec<String>, DomainError>;
}
