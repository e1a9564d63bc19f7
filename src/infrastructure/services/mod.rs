//! Infrastructure services

mod action;
mod deployment_sync;
mod model_sync;

pub use action::{run_action, ActionInputs};
pub use deployment_sync::{settings_update, DeploymentSyncService};
pub use model_sync::ModelSyncService;

use tracing::{debug, info};

use crate::domain::{ChangeKind, EventName, GitId, ReconcileReport};

/// Event and git context shared by both stages
#[derive(Debug, Clone)]
pub struct RunContext {
    pub event: EventName,
    pub commit_sha: Option<String>,
    pub ref_name: String,
    pub allow_model_deletion: bool,
    pub allow_deployment_deletion: bool,
}

/// Records a change, applied unless the event is a dry run
fn note(
    report: &mut ReconcileReport,
    event: EventName,
    kind: ChangeKind,
    git_id: &GitId,
    detail: impl Into<String>,
) {
    let detail = detail.into();
    let applied = !event.is_dry_run();
    if applied {
        info!(%kind, git_id = %git_id, %detail, "Applying change");
    } else {
        debug!(%kind, git_id = %git_id, %detail, "Planned change");
    }
    report.record(kind, git_id, detail, applied);
}
