//! Action entrypoint - one run of the sync action for a simulated event

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use super::{DeploymentSyncService, ModelSyncService, RunContext};
use crate::domain::{DomainError, EventName, PlatformClient, ReconcileReport, Stage};
use crate::infrastructure::git::GitRepository;
use crate::infrastructure::local::{LocalDefinitions, RemovedDefinitions};

/// Inputs of a single action run
#[derive(Debug, Clone)]
pub struct ActionInputs {
    pub repo_root: PathBuf,
    /// Branch whose pushes are applied
    pub branch: String,
    pub event: EventName,
    /// Deployment stage when set, model stage otherwise
    pub is_deploy: bool,
    pub allow_model_deletion: bool,
    pub allow_deployment_deletion: bool,
}

impl ActionInputs {
    pub fn new(repo_root: impl Into<PathBuf>, branch: impl Into<String>, event: EventName) -> Self {
        Self {
            repo_root: repo_root.into(),
            branch: branch.into(),
            event,
            is_deploy: false,
            allow_model_deletion: false,
            allow_deployment_deletion: false,
        }
    }

    pub fn deploy(mut self, is_deploy: bool) -> Self {
        self.is_deploy = is_deploy;
        self
    }

    pub fn allow_model_deletion(mut self, allow: bool) -> Self {
        self.allow_model_deletion = allow;
        self
    }

    pub fn allow_deployment_deletion(mut self, allow: bool) -> Self {
        self.allow_deployment_deletion = allow;
        self
    }

    pub fn stage(&self) -> Stage {
        Stage::from_deploy_flag(self.is_deploy)
    }
}

/// Runs the action against the working tree at `inputs.repo_root`.
///
/// A `push` whose checked-out branch is not `inputs.branch` is ignored and
/// yields an empty report. Only remote resources whose definition file was
/// deleted from this repository's history are considered for deletion.
pub async fn run_action(
    inputs: &ActionInputs,
    client: Arc<dyn PlatformClient>,
) -> Result<ReconcileReport, DomainError> {
    let stage = inputs.stage();
    let span = info_span!("action", event = %inputs.event, stage = ?stage);

    async move {
        let repo = GitRepository::open(&inputs.repo_root).await?;
        let head = repo.head_commit().await?;
        let current_branch = repo.current_branch().await?;

        if inputs.event == EventName::Push && current_branch != inputs.branch {
            warn!(
                branch = %current_branch,
                expected = %inputs.branch,
                "Push on a non-target branch, nothing to do"
            );
            return Ok(ReconcileReport::new(inputs.event, stage));
        }

        let root = inputs.repo_root.clone();
        let mut definitions = tokio::task::spawn_blocking(move || LocalDefinitions::scan(&root))
            .await
            .map_err(|e| DomainError::internal(format!("Definition scan failed: {}", e)))??;
        definitions.removed = RemovedDefinitions::from_history(&repo).await?;

        let ctx = RunContext {
            event: inputs.event,
            commit_sha: Some(head),
            ref_name: inputs.branch.clone(),
            allow_model_deletion: inputs.allow_model_deletion,
            allow_deployment_deletion: inputs.allow_deployment_deletion,
        };

        let report = match stage {
            Stage::Models => {
                ModelSyncService::new(client)
                    .reconcile(&definitions, &ctx)
                    .await?
            }
            Stage::Deployments => {
                DeploymentSyncService::new(client)
                    .reconcile(&definitions, &ctx)
                    .await?
            }
        };

        info!(
            applied = report.applied().count(),
            planned = report.planned().count(),
            "Action run finished"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}
