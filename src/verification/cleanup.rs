//! Teardown of remote resources created by a verification run

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use super::VerificationError;
use crate::domain::{GitId, PlatformClient};

/// Deletes the deployments and models a run created, keyed by git id
#[derive(Debug, Clone)]
pub struct CleanupCoordinator {
    client: Arc<dyn PlatformClient>,
    deployments: Vec<GitId>,
    models: Vec<GitId>,
}

impl CleanupCoordinator {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            client,
            deployments: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn with_deployment(mut self, git_deployment_id: GitId) -> Self {
        self.deployments.push(git_deployment_id);
        self
    }

    pub fn with_models(mut self, git_model_ids: impl IntoIterator<Item = GitId>) -> Self {
        self.models.extend(git_model_ids);
        self
    }

    /// Deletes deployments first, then models.
    ///
    /// Client and illegal-deletion errors on a deployment are swallowed;
    /// any error on a model is returned.
    pub async fn cleanup(&self) -> Result<(), VerificationError> {
        for id in &self.deployments {
            match self.client.delete_deployment_by_git_id(id).await {
                Ok(deleted) => debug!(git_deployment_id = %id, deleted, "Deployment cleanup"),
                Err(e) if e.is_tolerated_on_cleanup() => {
                    warn!(git_deployment_id = %id, error = %e, "Ignoring deployment cleanup failure")
                }
                Err(e) => return Err(e.into()),
            }
        }

        for id in &self.models {
            let deleted = self.client.delete_custom_model_by_git_id(id).await?;
            debug!(git_model_id = %id, deleted, "Model cleanup");
        }

        Ok(())
    }
}

/// Runs `body`, then `coordinator.cleanup()` whatever the outcome.
///
/// A panic in `body` is resumed after cleanup; an error from `body` wins
/// over a cleanup error.
pub async fn with_cleanup<T, F>(coordinator: &CleanupCoordinator, body: F) -> Result<T, VerificationError>
where
    F: Future<Output = Result<T, VerificationError>>,
{
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let cleaned = coordinator.cleanup().await;

    match outcome {
        Err(panic) => {
            if let Err(e) = &cleaned {
                warn!(error = %e, "Cleanup failed while unwinding");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(e)) => {
            if let Err(cleanup_error) = &cleaned {
                warn!(error = %cleanup_error, "Cleanup failed after an error");
            }
            Err(e)
        }
        Ok(Ok(value)) => cleaned.map(|_| value),
    }
}
