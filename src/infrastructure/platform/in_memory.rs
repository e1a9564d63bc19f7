//! In-memory platform for tests and offline runs

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::platform::{
    ActualsFromDatasetRequest, Challenger, ChallengerModel, CreateCustomModelRequest,
    CreateDeploymentRequest, CreateModelVersionRequest, CustomModel, CustomModelImage, Dataset,
    DeployedModel, Deployment, DeploymentInfoUpdate, DeploymentSettingsSnapshot,
    DeploymentSettingsUpdate, ModelVersion, PlatformClient,
};
use crate::domain::{DomainError, GitId};

#[derive(Debug, Default)]
struct PlatformState {
    next_id: u64,
    custom_models: Vec<CustomModel>,
    versions: HashMap<String, Vec<ModelVersion>>,
    deployments: Vec<Deployment>,
    settings: HashMap<String, DeploymentSettingsSnapshot>,
    challengers: HashMap<String, Vec<Challenger>>,
    datasets: HashMap<String, Dataset>,
    uploads: usize,
    actuals: HashMap<String, Vec<String>>,
}

impl PlatformState {
    fn generate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:06}", prefix, self.next_id)
    }

    fn find_version(&self, version_id: &str) -> Option<&ModelVersion> {
        self.versions
            .values()
            .flat_map(|versions| versions.iter())
            .find(|v| v.id == version_id)
    }

    fn deployment_mut(&mut self, deployment_id: &str) -> Result<&mut Deployment, DomainError> {
        self.deployments
            .iter_mut()
            .find(|d| d.id == deployment_id)
            .ok_or_else(|| deployment_not_found(deployment_id))
    }

    fn require_deployment(&self, deployment_id: &str) -> Result<&Deployment, DomainError> {
        self.deployments
            .iter()
            .find(|d| d.id == deployment_id)
            .ok_or_else(|| deployment_not_found(deployment_id))
    }

    fn model_in_use(&self, custom_model_id: &str) -> bool {
        self.deployments
            .iter()
            .any(|d| d.model.custom_model_image.custom_model_id == custom_model_id)
    }
}

fn deployment_not_found(deployment_id: &str) -> DomainError {
    DomainError::client(404, format!("Deployment '{}' not found", deployment_id))
}

/// A simulated platform with the same contract as the REST API.
///
/// Enforced rules: git ids are unique per resource type, a custom model
/// cannot be deleted while a deployment serves it, and challengers need
/// predictions data collection.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: RwLock<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deployment_count(&self) -> usize {
        self.state.read().await.deployments.len()
    }

    pub async fn custom_model_count(&self) -> usize {
        self.state.read().await.custom_models.len()
    }

    pub async fn dataset_count(&self) -> usize {
        self.state.read().await.datasets.len()
    }

    /// Datasets uploaded so far, deleted ones included
    pub async fn uploaded_dataset_count(&self) -> usize {
        self.state.read().await.uploads
    }
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn fetch_custom_models(&self) -> Result<Vec<CustomModel>, DomainError> {
        Ok(self.state.read().await.custom_models.clone())
    }

    async fn fetch_custom_model_by_git_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<CustomModel>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .custom_models
            .iter()
            .find(|m| m.git_model_id.as_deref() == Some(git_model_id.as_str()))
            .cloned())
    }

    async fn create_custom_model(
        &self,
        request: &CreateCustomModelRequest,
    ) -> Result<CustomModel, DomainError> {
        let mut state = self.state.write().await;

        if state
            .custom_models
            .iter()
            .any(|m| m.git_model_id.as_deref() == Some(request.git_model_id.as_str()))
        {
            return Err(DomainError::client(
                409,
                format!("Custom model '{}' already exists", request.git_model_id),
            ));
        }

        let model = CustomModel {
            id: state.generate_id("cm"),
            git_model_id: Some(request.git_model_id.clone()),
            name: request.name.clone(),
            description: request.description.clone(),
            target_type: request.target_type,
            target_name: request.target_name.clone(),
            created: Utc::now(),
        };
        state.versions.insert(model.id.clone(), Vec::new());
        state.custom_models.push(model.clone());
        Ok(model)
    }

    async fn create_custom_model_version(
        &self,
        custom_model_id: &str,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersion, DomainError> {
        let mut state = self.state.write().await;
        let id = state.generate_id("cmv");

        let versions = state.versions.get_mut(custom_model_id).ok_or_else(|| {
            DomainError::client(404, format!("Custom model '{}' not found", custom_model_id))
        })?;

        let version = ModelVersion {
            id,
            custom_model_id: custom_model_id.to_string(),
            version_number: versions.len() as u32 + 1,
            memory: request.memory,
            replicas: request.replicas,
            base_environment_id: request.base_environment_id.clone(),
            git_model_version: Some(request.git_model_version.clone()),
            created: Utc::now(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn fetch_custom_model_latest_version_by_git_model_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<ModelVersion>, DomainError> {
        let state = self.state.read().await;
        let Some(model) = state
            .custom_models
            .iter()
            .find(|m| m.git_model_id.as_deref() == Some(git_model_id.as_str()))
        else {
            return Ok(None);
        };

        Ok(state
            .versions
            .get(&model.id)
            .and_then(|versions| versions.last())
            .cloned())
    }

    async fn delete_custom_model_by_git_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .custom_models
            .iter()
            .position(|m| m.git_model_id.as_deref() == Some(git_model_id.as_str()))
        else {
            return Ok(false);
        };

        let model_id = state.custom_models[index].id.clone();
        if state.model_in_use(&model_id) {
            return Err(DomainError::illegal_deletion(format!(
                "Custom model '{}' is used by a deployment",
                git_model_id
            )));
        }

        state.custom_models.remove(index);
        state.versions.remove(&model_id);
        Ok(true)
    }

    async fn fetch_deployments(&self) -> Result<Vec<Deployment>, DomainError> {
        Ok(self.state.read().await.deployments.clone())
    }

    async fn fetch_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<Option<Deployment>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .deployments
            .iter()
            .find(|d| d.git_deployment_id.as_deref() == Some(git_deployment_id.as_str()))
            .cloned())
    }

    async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<Deployment, DomainError> {
        let mut state = self.state.write().await;

        if state
            .deployments
            .iter()
            .any(|d| d.git_deployment_id.as_deref() == Some(request.git_deployment_id.as_str()))
        {
            return Err(DomainError::client(
                409,
                format!("Deployment '{}' already exists", request.git_deployment_id),
            ));
        }

        let custom_model_id = state
            .find_version(&request.custom_model_version_id)
            .map(|v| v.custom_model_id.clone())
            .ok_or_else(|| {
                DomainError::client(
                    404,
                    format!(
                        "Custom model version '{}' not found",
                        request.custom_model_version_id
                    ),
                )
            })?;

        let deployment = Deployment {
            id: state.generate_id("dep"),
            label: request.label.clone(),
            description: request.description.clone(),
            importance: request.importance,
            git_deployment_id: Some(request.git_deployment_id.clone()),
            model: DeployedModel {
                id: format!("pkg-{}", request.custom_model_version_id),
                custom_model_image: CustomModelImage {
                    custom_model_id,
                    custom_model_version_id: request.custom_model_version_id.clone(),
                },
            },
        };

        state
            .settings
            .insert(deployment.id.clone(), DeploymentSettingsSnapshot::default());
        state.challengers.insert(deployment.id.clone(), Vec::new());
        state.deployments.push(deployment.clone());
        Ok(deployment)
    }

    async fn update_deployment_info(
        &self,
        deployment_id: &str,
        update: &DeploymentInfoUpdate,
    ) -> Result<Deployment, DomainError> {
        let mut state = self.state.write().await;
        let deployment = state.deployment_mut(deployment_id)?;

        if let Some(label) = &update.label {
            deployment.label = label.clone();
        }
        if let Some(description) = &update.description {
            deployment.description = Some(description.clone());
        }
        if let Some(importance) = update.importance {
            deployment.importance = Some(importance);
        }

        Ok(deployment.clone())
    }

    async fn replace_deployment_model(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
    ) -> Result<Deployment, DomainError> {
        let mut state = self.state.write().await;
        let custom_model_id = state
            .find_version(custom_model_version_id)
            .map(|v| v.custom_model_id.clone())
            .ok_or_else(|| {
                DomainError::client(
                    404,
                    format!("Custom model version '{}' not found", custom_model_version_id),
                )
            })?;

        let deployment = state.deployment_mut(deployment_id)?;
        deployment.model = DeployedModel {
            id: format!("pkg-{}", custom_model_version_id),
            custom_model_image: CustomModelImage {
                custom_model_id,
                custom_model_version_id: custom_model_version_id.to_string(),
            },
        };
        Ok(deployment.clone())
    }

    async fn fetch_deployment_settings(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentSettingsSnapshot, DomainError> {
        self.state
            .read()
            .await
            .settings
            .get(deployment_id)
            .cloned()
            .ok_or_else(|| deployment_not_found(deployment_id))
    }

    async fn update_deployment_settings(
        &self,
        deployment_id: &str,
        update: &DeploymentSettingsUpdate,
    ) -> Result<DeploymentSettingsSnapshot, DomainError> {
        let mut state = self.state.write().await;
        let current = state
            .settings
            .get(deployment_id)
            .ok_or_else(|| deployment_not_found(deployment_id))?;

        let mut next = current.clone();
        if let Some(value) = update.target_drift {
            next.target_drift = value;
        }
        if let Some(value) = update.feature_drift {
            next.feature_drift = value;
        }
        if let Some(value) = &update.segment_analysis {
            next.segment_analysis = value.clone();
        }
        if let Some(value) = update.challenger_models {
            next.challenger_models = value;
        }
        if let Some(value) = update.predictions_data_collection {
            next.predictions_data_collection = value;
        }
        if let Some(value) = &update.association_id {
            next.association_id = value.clone();
        }

        if next.challenger_models.enabled && !next.predictions_data_collection.enabled {
            return Err(DomainError::client(
                422,
                "Challenger models require predictions data collection",
            ));
        }

        state.settings.insert(deployment_id.to_string(), next.clone());
        Ok(next)
    }

    async fn fetch_challengers(&self, deployment_id: &str) -> Result<Vec<Challenger>, DomainError> {
        self.state
            .read()
            .await
            .challengers
            .get(deployment_id)
            .cloned()
            .ok_or_else(|| deployment_not_found(deployment_id))
    }

    async fn add_challenger(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
        name: &str,
    ) -> Result<Challenger, DomainError> {
        let mut state = self.state.write().await;
        state.require_deployment(deployment_id)?;

        let enabled = state
            .settings
            .get(deployment_id)
            .map(|s| s.challenger_models.enabled)
            .unwrap_or(false);
        if !enabled {
            return Err(DomainError::client(
                422,
                format!("Challenger models are disabled for '{}'", deployment_id),
            ));
        }

        if state.find_version(custom_model_version_id).is_none() {
            return Err(DomainError::client(
                404,
                format!("Custom model version '{}' not found", custom_model_version_id),
            ));
        }

        let challenger = Challenger {
            id: state.generate_id("ch"),
            name: name.to_string(),
            model: ChallengerModel {
                id: custom_model_version_id.to_string(),
            },
        };
        state
            .challengers
            .entry(deployment_id.to_string())
            .or_default()
            .push(challenger.clone());
        Ok(challenger)
    }

    async fn delete_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .deployments
            .iter()
            .position(|d| d.git_deployment_id.as_deref() == Some(git_deployment_id.as_str()))
        else {
            return Ok(false);
        };

        let deployment = state.deployments.remove(index);
        state.settings.remove(&deployment.id);
        state.challengers.remove(&deployment.id);
        state.actuals.remove(&deployment.id);
        Ok(true)
    }

    async fn upload_dataset(&self, path: &Path) -> Result<Dataset, DomainError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let row_count = content.lines().skip(1).filter(|l| !l.trim().is_empty()).count() as u64;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut state = self.state.write().await;
        let dataset = Dataset {
            id: state.generate_id("ds"),
            name,
            row_count,
        };
        state.datasets.insert(dataset.id.clone(), dataset.clone());
        state.uploads += 1;
        Ok(dataset)
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), DomainError> {
        self.state
            .write()
            .await
            .datasets
            .remove(dataset_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::client(404, format!("Dataset '{}' not found", dataset_id)))
    }

    async fn submit_actuals_from_dataset(
        &self,
        deployment_id: &str,
        request: &ActualsFromDatasetRequest,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.require_deployment(deployment_id)?;

        if !state.datasets.contains_key(&request.dataset_id) {
            return Err(DomainError::client(
                404,
                format!("Dataset '{}' not found", request.dataset_id),
            ));
        }

        let has_association = state
            .settings
            .get(deployment_id)
            .map(|s| !s.association_id.column_names.is_empty())
            .unwrap_or(false);
        if !has_association {
            return Err(DomainError::client(
                422,
                format!("Deployment '{}' has no association id", deployment_id),
            ));
        }

        state
            .actuals
            .entry(deployment_id.to_string())
            .or_default()
            .push(request.dataset_id.clone());
        Ok(())
    }

    async fn fetch_actuals_dataset_ids(
        &self,
        deployment_id: &str,
    ) -> Result<Vec<String>, DomainError> {
        let state = self.state.read().await;
        state.require_deployment(deployment_id)?;
        Ok(state.actuals.get(deployment_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TargetType;
    use crate::domain::platform::{EnabledSetting, GitModelVersion};

    async fn platform_with_version() -> (InMemoryPlatform, CustomModel, ModelVersion) {
        let platform = InMemoryPlatform::new();
        let model = platform
            .create_custom_model(&CreateCustomModelRequest {
                git_model_id: "model-1".to_string(),
                name: "Model".to_string(),
                description: None,
                target_type: TargetType::Regression,
                target_name: Some("Grade 2014".to_string()),
            })
            .await
            .unwrap();
        let version = platform
            .create_custom_model_version(&model.id, &version_request("digest-1"))
            .await
            .unwrap();
        (platform, model, version)
    }

    fn version_request(digest: &str) -> CreateModelVersionRequest {
        CreateModelVersionRequest {
            memory: 256 * 1024 * 1024,
            replicas: 1,
            base_environment_id: None,
            git_model_version: GitModelVersion {
                commit_sha: None,
                ref_name: None,
                content_digest: digest.to_string(),
            },
        }
    }

    fn deployment_request(version_id: &str) -> CreateDeploymentRequest {
        CreateDeploymentRequest {
            git_deployment_id: "deployment-1".to_string(),
            custom_model_version_id: version_id.to_string(),
            label: "Deployment".to_string(),
            description: None,
            importance: None,
        }
    }

    #[tokio::test]
    async fn test_git_ids_are_unique() {
        let (platform, _, version) = platform_with_version().await;

        let duplicate = platform
            .create_custom_model(&CreateCustomModelRequest {
                git_model_id: "model-1".to_string(),
                name: "Again".to_string(),
                description: None,
                target_type: TargetType::Regression,
                target_name: None,
            })
            .await;
        assert!(duplicate.is_err());

        platform
            .create_deployment(&deployment_request(&version.id))
            .await
            .unwrap();
        assert!(platform
            .create_deployment(&deployment_request(&version.id))
            .await
            .is_err());
        assert_eq!(platform.deployment_count().await, 1);
    }

    #[tokio::test]
    async fn test_latest_version_is_newest() {
        let (platform, model, _) = platform_with_version().await;
        let second = platform
            .create_custom_model_version(&model.id, &version_request("digest-2"))
            .await
            .unwrap();

        let latest = platform
            .fetch_custom_model_latest_version_by_git_model_id(&GitId::new("model-1").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(latest.id, second.id);
        assert_eq!(latest.version_number, 2);
        assert_eq!(latest.content_digest(), Some("digest-2"));
    }

    #[tokio::test]
    async fn test_model_deletion_blocked_while_deployed() {
        let (platform, _, version) = platform_with_version().await;
        platform
            .create_deployment(&deployment_request(&version.id))
            .await
            .unwrap();

        let model_id = GitId::new("model-1").unwrap();
        let result = platform.delete_custom_model_by_git_id(&model_id).await;
        assert!(matches!(result, Err(DomainError::IllegalDeletion { .. })));

        let deployment_id = GitId::new("deployment-1").unwrap();
        assert!(platform
            .delete_deployment_by_git_id(&deployment_id)
            .await
            .unwrap());
        assert!(platform
            .delete_custom_model_by_git_id(&model_id)
            .await
            .unwrap());
        assert_eq!(platform.custom_model_count().await, 0);
    }

    #[tokio::test]
    async fn test_challengers_require_predictions_collection() {
        let (platform, _, version) = platform_with_version().await;
        let deployment = platform
            .create_deployment(&deployment_request(&version.id))
            .await
            .unwrap();

        let invalid = DeploymentSettingsUpdate {
            challenger_models: Some(EnabledSetting::new(true)),
            ..Default::default()
        };
        assert!(platform
            .update_deployment_settings(&deployment.id, &invalid)
            .await
            .is_err());

        let disabled = platform
            .add_challenger(&deployment.id, &version.id, "challenger")
            .await;
        assert!(disabled.is_err());

        let valid = DeploymentSettingsUpdate {
            challenger_models: Some(EnabledSetting::new(true)),
            predictions_data_collection: Some(EnabledSetting::new(true)),
            ..Default::default()
        };
        platform
            .update_deployment_settings(&deployment.id, &valid)
            .await
            .unwrap();

        let challenger = platform
            .add_challenger(&deployment.id, &version.id, "challenger")
            .await
            .unwrap();
        assert_eq!(challenger.model.id, version.id);
        assert_eq!(
            platform.fetch_challengers(&deployment.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_replace_model_updates_primary_version() {
        let (platform, model, version) = platform_with_version().await;
        let deployment = platform
            .create_deployment(&deployment_request(&version.id))
            .await
            .unwrap();
        let second = platform
            .create_custom_model_version(&model.id, &version_request("digest-2"))
            .await
            .unwrap();

        let replaced = platform
            .replace_deployment_model(&deployment.id, &second.id)
            .await
            .unwrap();

        assert_eq!(replaced.model_version_id(), second.id);
        assert!(platform
            .replace_deployment_model(&deployment.id, "cmv-missing")
            .await
            .is_err());
    }
}
