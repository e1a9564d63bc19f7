//! Event simulation driver

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::VerificationError;
use crate::domain::{EventName, PlatformClient, ReconcileReport};
use crate::infrastructure::git::GitRepository;
use crate::infrastructure::services::{run_action, ActionInputs};

/// Runs the action against one repository and platform, the way CI would
#[derive(Debug, Clone)]
pub struct EventDriver {
    repo: GitRepository,
    branch: String,
    client: Arc<dyn PlatformClient>,
}

impl EventDriver {
    pub fn new(repo: GitRepository, branch: impl Into<String>, client: Arc<dyn PlatformClient>) -> Self {
        Self {
            repo,
            branch: branch.into(),
            client,
        }
    }

    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    pub fn client(&self) -> &Arc<dyn PlatformClient> {
        &self.client
    }

    /// Simulates `event` for the model stage, or the deployment stage when `is_deploy`
    pub async fn run(
        &self,
        event: EventName,
        is_deploy: bool,
        allow_deployment_deletion: bool,
    ) -> Result<ReconcileReport, VerificationError> {
        info!(%event, is_deploy, allow_deployment_deletion, "Running action");

        let inputs = ActionInputs::new(self.repo.root(), self.branch.clone(), event)
            .deploy(is_deploy)
            .allow_deployment_deletion(allow_deployment_deletion);

        Ok(run_action(&inputs, self.client.clone()).await?)
    }

    /// Pushes the models, the usual preliminary step of every scenario
    pub async fn push_models(&self) -> Result<ReconcileReport, VerificationError> {
        self.run(EventName::Push, false, false).await
    }

    pub async fn deploy(&self, event: EventName) -> Result<ReconcileReport, VerificationError> {
        self.run(event, true, false).await
    }

    pub async fn commit_all(&self, message: &str) -> Result<(), VerificationError> {
        Ok(self.repo.commit_all(message).await?)
    }

    pub async fn amend(&self) -> Result<(), VerificationError> {
        Ok(self.repo.amend().await?)
    }
}
