//! Remote state verifier
//!
//! Each check reads the platform after an event was driven and compares it
//! with the outcome expected for that event: `push` persists, `pull_request`
//! leaves the platform untouched.

use std::sync::Arc;

use tracing::debug;

use super::error::{ensure_eq, VerificationError};
use crate::domain::platform::{Deployment, DeploymentSettingsSnapshot, ModelVersion};
use crate::domain::{DeploymentSettings, EventName, GitId, PlatformClient};

#[derive(Debug, Clone)]
pub struct RemoteStateVerifier {
    client: Arc<dyn PlatformClient>,
}

impl RemoteStateVerifier {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    pub async fn deployment(&self, git_deployment_id: &GitId) -> Result<Deployment, VerificationError> {
        self.client
            .fetch_deployment_by_git_id(git_deployment_id)
            .await?
            .ok_or_else(|| VerificationError::missing(format!("deployment '{}'", git_deployment_id)))
    }

    pub async fn latest_model_version(&self, git_model_id: &GitId) -> Result<ModelVersion, VerificationError> {
        self.client
            .fetch_custom_model_latest_version_by_git_model_id(git_model_id)
            .await?
            .ok_or_else(|| VerificationError::missing(format!("latest version of model '{}'", git_model_id)))
    }

    pub async fn settings(
        &self,
        deployment: &Deployment,
    ) -> Result<DeploymentSettingsSnapshot, VerificationError> {
        Ok(self.client.fetch_deployment_settings(&deployment.id).await?)
    }

    /// Whether a deployment with the git id is listed
    pub async fn deployment_listed(&self, git_deployment_id: &GitId) -> Result<bool, VerificationError> {
        let deployments = self.client.fetch_deployments().await?;
        Ok(deployments
            .iter()
            .any(|d| d.git_deployment_id.as_deref() == Some(git_deployment_id.as_str())))
    }

    pub async fn verify_deployment_presence(
        &self,
        git_deployment_id: &GitId,
        expected: bool,
    ) -> Result<(), VerificationError> {
        let listed = self.deployment_listed(git_deployment_id).await?;
        debug!(%git_deployment_id, listed, expected, "Deployment presence");
        ensure_eq(
            &format!("presence of deployment '{}'", git_deployment_id),
            expected,
            listed,
        )
    }

    /// Created on `push`, absent after `pull_request`
    pub async fn verify_deployment_created(
        &self,
        event: EventName,
        git_deployment_id: &GitId,
    ) -> Result<(), VerificationError> {
        let found = self
            .client
            .fetch_deployment_by_git_id(git_deployment_id)
            .await?
            .is_some();
        ensure_eq(
            &format!("deployment '{}' exists", git_deployment_id),
            !event.is_dry_run(),
            found,
        )
    }

    /// The primary version is the newest version only after a `push`
    pub async fn verify_model_replacement(
        &self,
        event: EventName,
        git_deployment_id: &GitId,
        git_model_id: &GitId,
    ) -> Result<(), VerificationError> {
        let deployment = self.deployment(git_deployment_id).await?;
        let latest = self.latest_model_version(git_model_id).await?;
        let primary = deployment.model_version_id();

        match event {
            EventName::Push => ensure_eq("primary model version", latest.id.as_str(), primary),
            EventName::PullRequest if primary == latest.id => Err(VerificationError::mismatch(
                "primary model version",
                format!("anything but {}", latest.id),
                primary,
            )),
            EventName::PullRequest => Ok(()),
        }
    }

    /// Two challengers after a `push`, the newest one carrying the latest
    /// version; the single initial challenger after a `pull_request`.
    /// The primary version is never replaced while challengers are enabled.
    pub async fn verify_challengers(
        &self,
        event: EventName,
        git_deployment_id: &GitId,
        git_model_id: &GitId,
    ) -> Result<(), VerificationError> {
        let deployment = self.deployment(git_deployment_id).await?;
        let latest = self.latest_model_version(git_model_id).await?;

        if deployment.model_version_id() == latest.id {
            return Err(VerificationError::mismatch(
                "primary model version while challenging",
                format!("anything but {}", latest.id),
                deployment.model_version_id(),
            ));
        }

        let challengers = self.client.fetch_challengers(&deployment.id).await?;
        match event {
            EventName::Push => {
                ensure_eq("challenger count", 2, challengers.len())?;
                let newest = challengers
                    .last()
                    .map(|c| c.model.id.as_str())
                    .unwrap_or_default();
                ensure_eq("newest challenger model", latest.id.as_str(), newest)
            }
            EventName::PullRequest => ensure_eq("challenger count", 1, challengers.len()),
        }
    }

    pub async fn verify_label(
        &self,
        event: EventName,
        git_deployment_id: &GitId,
        old_label: &str,
        new_label: &str,
    ) -> Result<(), VerificationError> {
        let deployment = self.deployment(git_deployment_id).await?;
        let expected = match event {
            EventName::Push => new_label,
            EventName::PullRequest => old_label,
        };
        ensure_eq("deployment label", expected, deployment.label.as_str())
    }

    /// Compares every monitored setting with `declared` after a `push` and
    /// with `before` after a `pull_request`
    pub async fn verify_settings(
        &self,
        event: EventName,
        deployment: &Deployment,
        before: &DeploymentSettingsSnapshot,
        declared: &DeploymentSettings,
    ) -> Result<(), VerificationError> {
        let after = self.settings(deployment).await?;

        let expected = match event {
            EventName::Push => ExpectedSettings::declared(declared),
            EventName::PullRequest => ExpectedSettings::snapshot(before),
        };
        let actual = ExpectedSettings::snapshot(&after);

        ensure_eq("target drift", expected.target_drift, actual.target_drift)?;
        ensure_eq("feature drift", expected.feature_drift, actual.feature_drift)?;
        ensure_eq("segment analysis", expected.segment_analysis, actual.segment_analysis)?;
        ensure_eq("challenger models", expected.challenger_models, actual.challenger_models)?;
        ensure_eq(
            "predictions data collection",
            expected.predictions_data_collection,
            actual.predictions_data_collection,
        )
    }
}

struct ExpectedSettings {
    target_drift: bool,
    feature_drift: bool,
    segment_analysis: bool,
    challenger_models: bool,
    predictions_data_collection: bool,
}

impl ExpectedSettings {
    fn declared(settings: &DeploymentSettings) -> Self {
        Self {
            target_drift: settings.enable_target_drift,
            feature_drift: settings.enable_feature_drift,
            segment_analysis: settings.segment_analysis.enabled,
            challenger_models: settings.enable_challenger_models,
            predictions_data_collection: settings.enable_predictions_collection,
        }
    }

    fn snapshot(snapshot: &DeploymentSettingsSnapshot) -> Self {
        Self {
            target_drift: snapshot.target_drift.enabled,
            feature_drift: snapshot.feature_drift.enabled,
            segment_analysis: snapshot.segment_analysis.enabled,
            challenger_models: snapshot.challenger_models.enabled,
            predictions_data_collection: snapshot.predictions_data_collection.enabled,
        }
    }
}
