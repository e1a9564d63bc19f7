//! REST implementation of the platform client

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::domain::platform::{
    ActualsFromDatasetRequest, Challenger, CreateCustomModelRequest, CreateDeploymentRequest,
    CreateModelVersionRequest, CustomModel, Dataset, Deployment, DeploymentInfoUpdate,
    DeploymentSettingsSnapshot, DeploymentSettingsUpdate, ModelVersion, PlatformClient,
};
use crate::domain::{DomainError, GitId};
use crate::infrastructure::http_client::HttpClientTrait;

const API_PREFIX: &str = "/api/v2";

/// One page of a paginated list endpoint
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActualsSubmission {
    dataset_id: String,
}

/// Platform client speaking the JSON REST API
#[derive(Debug)]
pub struct RestPlatformClient<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> RestPlatformClient<C> {
    pub fn new(client: C, endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = endpoint.trim_end_matches('/');
        let base_url = if endpoint.ends_with(API_PREFIX) {
            endpoint.to_string()
        } else {
            format!("{}{}", endpoint, API_PREFIX)
        };

        Self {
            client,
            auth_header: format!("Bearer {}", api_token.into()),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn auth_headers(&self) -> Vec<(&str, &str)> {
        vec![("Authorization", self.auth_header.as_str())]
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DomainError> {
        let json = self.client.get_json(&self.url(path), self.headers()).await?;
        parse(json)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, DomainError> {
        let body = to_json(body)?;
        let json = self
            .client
            .post_json(&self.url(path), self.headers(), &body)
            .await?;
        parse(json)
    }

    async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, DomainError> {
        let body = to_json(body)?;
        let json = self
            .client
            .patch_json(&self.url(path), self.headers(), &body)
            .await?;
        parse(json)
    }

    async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DomainError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));

        while let Some(url) = next {
            let json = self.client.get_json(&url, self.headers()).await?;
            let page: Page<T> = parse(json)?;
            items.extend(page.data);
            next = page.next;
        }

        Ok(items)
    }

    /// Deletes `path`, mapping "still referenced" responses to `IllegalDeletion`
    async fn delete_resource(&self, path: &str, what: &str) -> Result<(), DomainError> {
        match self.client.delete(&self.url(path), self.auth_headers()).await {
            Ok(()) => Ok(()),
            Err(DomainError::Client { status, message }) if status == 409 || status == 422 => {
                Err(DomainError::illegal_deletion(format!("{}: {}", what, message)))
            }
            Err(e) => Err(e),
        }
    }

    async fn custom_model_versions(
        &self,
        custom_model_id: &str,
    ) -> Result<Vec<ModelVersion>, DomainError> {
        self.fetch_all(&format!("customModels/{}/versions/", custom_model_id))
            .await
    }
}

fn to_json(body: &impl serde::Serialize) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(body)
        .map_err(|e| DomainError::internal(format!("Failed to serialize request: {}", e)))
}

fn parse<T: DeserializeOwned>(json: serde_json::Value) -> Result<T, DomainError> {
    serde_json::from_value(json)
        .map_err(|e| DomainError::client(0, format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl<C: HttpClientTrait> PlatformClient for RestPlatformClient<C> {
    async fn fetch_custom_models(&self) -> Result<Vec<CustomModel>, DomainError> {
        self.fetch_all("customModels/").await
    }

    async fn fetch_custom_model_by_git_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<CustomModel>, DomainError> {
        Ok(self
            .fetch_custom_models()
            .await?
            .into_iter()
            .find(|m| m.git_model_id.as_deref() == Some(git_model_id.as_str())))
    }

    async fn create_custom_model(
        &self,
        request: &CreateCustomModelRequest,
    ) -> Result<CustomModel, DomainError> {
        self.post("customModels/", request).await
    }

    async fn create_custom_model_version(
        &self,
        custom_model_id: &str,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersion, DomainError> {
        self.post(&format!("customModels/{}/versions/", custom_model_id), request)
            .await
    }

    async fn fetch_custom_model_latest_version_by_git_model_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<Option<ModelVersion>, DomainError> {
        let Some(model) = self.fetch_custom_model_by_git_id(git_model_id).await? else {
            return Ok(None);
        };

        Ok(self
            .custom_model_versions(&model.id)
            .await?
            .into_iter()
            .max_by_key(|v| v.version_number))
    }

    async fn delete_custom_model_by_git_id(
        &self,
        git_model_id: &GitId,
    ) -> Result<bool, DomainError> {
        let Some(model) = self.fetch_custom_model_by_git_id(git_model_id).await? else {
            return Ok(false);
        };

        self.delete_resource(
            &format!("customModels/{}/", model.id),
            &format!("custom model '{}'", git_model_id),
        )
        .await?;
        debug!(git_model_id = %git_model_id, custom_model_id = %model.id, "Deleted custom model");
        Ok(true)
    }

    async fn fetch_deployments(&self) -> Result<Vec<Deployment>, DomainError> {
        self.fetch_all("deployments/").await
    }

    async fn fetch_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<Option<Deployment>, DomainError> {
        Ok(self
            .fetch_deployments()
            .await?
            .into_iter()
            .find(|d| d.git_deployment_id.as_deref() == Some(git_deployment_id.as_str())))
    }

    async fn create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<Deployment, DomainError> {
        self.post("deployments/fromCustomModelVersion/", request)
            .await
    }

    async fn update_deployment_info(
        &self,
        deployment_id: &str,
        update: &DeploymentInfoUpdate,
    ) -> Result<Deployment, DomainError> {
        self.patch(&format!("deployments/{}/", deployment_id), update)
            .await
    }

    async fn replace_deployment_model(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
    ) -> Result<Deployment, DomainError> {
        let body = serde_json::json!({ "customModelVersionId": custom_model_version_id });
        self.patch(&format!("deployments/{}/model/", deployment_id), &body)
            .await
    }

    async fn fetch_deployment_settings(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentSettingsSnapshot, DomainError> {
        self.get(&format!("deployments/{}/settings/", deployment_id))
            .await
    }

    async fn update_deployment_settings(
        &self,
        deployment_id: &str,
        update: &DeploymentSettingsUpdate,
    ) -> Result<DeploymentSettingsSnapshot, DomainError> {
        self.patch(&format!("deployments/{}/settings/", deployment_id), update)
            .await
    }

    async fn fetch_challengers(&self, deployment_id: &str) -> Result<Vec<Challenger>, DomainError> {
        self.fetch_all(&format!("deployments/{}/challengers/", deployment_id))
            .await
    }

    async fn add_challenger(
        &self,
        deployment_id: &str,
        custom_model_version_id: &str,
        name: &str,
    ) -> Result<Challenger, DomainError> {
        let body = serde_json::json!({
            "customModelVersionId": custom_model_version_id,
            "name": name,
        });
        self.post(&format!("deployments/{}/challengers/", deployment_id), &body)
            .await
    }

    async fn delete_deployment_by_git_id(
        &self,
        git_deployment_id: &GitId,
    ) -> Result<bool, DomainError> {
        let Some(deployment) = self.fetch_deployment_by_git_id(git_deployment_id).await? else {
            return Ok(false);
        };

        self.delete_resource(
            &format!("deployments/{}/", deployment.id),
            &format!("deployment '{}'", git_deployment_id),
        )
        .await?;
        debug!(git_deployment_id = %git_deployment_id, deployment_id = %deployment.id, "Deleted deployment");
        Ok(true)
    }

    async fn upload_dataset(&self, path: &Path) -> Result<Dataset, DomainError> {
        let json = self
            .client
            .post_file(&self.url("datasets/fromFile/"), self.auth_headers(), path)
            .await?;
        parse(json)
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), DomainError> {
        self.client
            .delete(
                &self.url(&format!("datasets/{}/", dataset_id)),
                self.auth_headers(),
            )
            .await
    }

    async fn submit_actuals_from_dataset(
        &self,
        deployment_id: &str,
        request: &ActualsFromDatasetRequest,
    ) -> Result<(), DomainError> {
        let _: serde_json::Value = self
            .post(
                &format!("deployments/{}/actuals/fromDataset/", deployment_id),
                request,
            )
            .await?;
        Ok(())
    }

    async fn fetch_actuals_dataset_ids(
        &self,
        deployment_id: &str,
    ) -> Result<Vec<String>, DomainError> {
        let submissions: Vec<ActualsSubmission> = self
            .fetch_all(&format!("deployments/{}/actuals/fromDataset/", deployment_id))
            .await?;
        Ok(submissions.into_iter().map(|s| s.dataset_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::mock::MockHttpClient;
    use crate::infrastructure::http_client::HttpMethod;

    const BASE: &str = "https://platform.test/api/v2";

    fn deployment_json(id: &str, git_id: &str, version_id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "label": "Deployment",
            "gitDeploymentId": git_id,
            "model": {
                "id": format!("pkg-{}", version_id),
                "customModelImage": {
                    "customModelId": "cm-1",
                    "customModelVersionId": version_id
                }
            }
        })
    }

    fn version_json(id: &str, number: u32) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "customModelId": "cm-1",
            "versionNumber": number,
            "memory": 268435456u64,
            "replicas": 1,
            "created": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_base_url_normalization() {
        let a = RestPlatformClient::new(MockHttpClient::new(), "https://platform.test/", "t");
        let b = RestPlatformClient::new(MockHttpClient::new(), "https://platform.test/api/v2", "t");

        assert_eq!(a.url("deployments/"), format!("{}/deployments/", BASE));
        assert_eq!(b.url("/deployments/"), format!("{}/deployments/", BASE));
    }

    #[tokio::test]
    async fn test_fetch_deployment_by_git_id_follows_pagination() {
        let page_two = format!("{}/deployments/?offset=1", BASE);
        let client = MockHttpClient::new()
            .with_response(
                HttpMethod::Get,
                format!("{}/deployments/", BASE),
                serde_json::json!({
                    "data": [deployment_json("d-1", "other", "cmv-1")],
                    "next": page_two
                }),
            )
            .with_response(
                HttpMethod::Get,
                page_two.clone(),
                serde_json::json!({
                    "data": [deployment_json("d-2", "deployment-1", "cmv-7")],
                    "next": null
                }),
            );

        let platform = RestPlatformClient::new(client, "https://platform.test", "token");
        let found = platform
            .fetch_deployment_by_git_id(&GitId::new("deployment-1").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "d-2");
        assert_eq!(found.model_version_id(), "cmv-7");
    }

    #[tokio::test]
    async fn test_latest_version_picks_highest_number() {
        let client = MockHttpClient::new()
            .with_response(
                HttpMethod::Get,
                format!("{}/customModels/", BASE),
                serde_json::json!({
                    "data": [{
                        "id": "cm-1",
                        "gitModelId": "model-1",
                        "name": "Model",
                        "targetType": "Regression",
                        "created": "2024-01-01T00:00:00Z"
                    }]
                }),
            )
            .with_response(
                HttpMethod::Get,
                format!("{}/customModels/cm-1/versions/", BASE),
                serde_json::json!({
                    "data": [version_json("cmv-2", 2), version_json("cmv-3", 3), version_json("cmv-1", 1)]
                }),
            );

        let platform = RestPlatformClient::new(client, "https://platform.test", "token");
        let latest = platform
            .fetch_custom_model_latest_version_by_git_model_id(&GitId::new("model-1").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(latest.id, "cmv-3");

        let missing = platform
            .fetch_custom_model_latest_version_by_git_model_id(&GitId::new("model-2").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_conflict_maps_to_illegal_deletion() {
        let client = MockHttpClient::new()
            .with_response(
                HttpMethod::Get,
                format!("{}/deployments/", BASE),
                serde_json::json!({"data": [deployment_json("d-1", "deployment-1", "cmv-1")]}),
            )
            .with_error(
                HttpMethod::Delete,
                format!("{}/deployments/d-1/", BASE),
                422,
                "deployment is referenced",
            );

        let platform = RestPlatformClient::new(client, "https://platform.test", "token");
        let error = platform
            .delete_deployment_by_git_id(&GitId::new("deployment-1").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(error, DomainError::IllegalDeletion { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_deployment_is_noop() {
        let client = MockHttpClient::new().with_response(
            HttpMethod::Get,
            format!("{}/deployments/", BASE),
            serde_json::json!({"data": []}),
        );

        let platform = RestPlatformClient::new(client, "https://platform.test", "token");
        let deleted = platform
            .delete_deployment_by_git_id(&GitId::new("deployment-1").unwrap())
            .await
            .unwrap();

        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_settings_update_wire_body() {
        let url = format!("{}/deployments/d-1/settings/", BASE);
        let client = MockHttpClient::new().with_response(
            HttpMethod::Patch,
            url.clone(),
            serde_json::json!({
                "targetDrift": {"enabled": false},
                "featureDrift": {"enabled": false},
                "segmentAnalysis": {"enabled": false},
                "challengerModels": {"enabled": true},
                "predictionsDataCollection": {"enabled": true}
            }),
        );
        let platform = RestPlatformClient::new(client, "https://platform.test", "token");

        let update = DeploymentSettingsUpdate {
            target_drift: Some(crate::domain::platform::EnabledSetting::new(false)),
            ..Default::default()
        };
        let settings = platform
            .update_deployment_settings("d-1", &update)
            .await
            .unwrap();
        assert!(!settings.target_drift.enabled);

        let requests = platform.client.requests();
        let (_, sent_url, body) = requests.last().unwrap();
        assert_eq!(sent_url, &url);
        assert_eq!(
            body.as_ref().unwrap(),
            &serde_json::json!({"targetDrift": {"enabled": false}})
        );
    }
}
