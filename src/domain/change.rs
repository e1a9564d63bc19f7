//! Changes detected between local definitions and remote state

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EventName, GitId};

/// The action stage a run reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Models,
    Deployments,
}

impl Stage {
    pub fn from_deploy_flag(is_deploy: bool) -> Self {
        if is_deploy {
            Self::Deployments
        } else {
            Self::Models
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CreateModel,
    CreateModelVersion,
    DeleteModel,
    CreateDeployment,
    UpdateDeploymentInfo,
    UpdateDeploymentSettings,
    ReplaceModel,
    AddChallenger,
    SubmitActuals,
    DeleteDeployment,
    /// Definition removed locally but deletion is not allowed
    SkipDeletion,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateModel => "create model",
            Self::CreateModelVersion => "create model version",
            Self::DeleteModel => "delete model",
            Self::CreateDeployment => "create deployment",
            Self::UpdateDeploymentInfo => "update deployment info",
            Self::UpdateDeploymentSettings => "update deployment settings",
            Self::ReplaceModel => "replace model",
            Self::AddChallenger => "add challenger",
            Self::SubmitActuals => "submit actuals",
            Self::DeleteDeployment => "delete deployment",
            Self::SkipDeletion => "skip deletion",
        };
        f.write_str(name)
    }
}

/// One detected change and whether it was persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub git_id: GitId,
    pub detail: String,
    pub applied: bool,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.applied { "applied" } else { "planned" };
        write!(f, "[{}] {} '{}': {}", state, self.kind, self.git_id, self.detail)
    }
}

/// Outcome of a single action run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub event: EventName,
    pub stage: Stage,
    pub changes: Vec<Change>,
}

impl ReconcileReport {
    pub fn new(event: EventName, stage: Stage) -> Self {
        Self {
            event,
            stage,
            changes: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        kind: ChangeKind,
        git_id: &GitId,
        detail: impl Into<String>,
        applied: bool,
    ) {
        self.changes.push(Change {
            kind,
            git_id: git_id.clone(),
            detail: detail.into(),
            applied,
        });
    }

    pub fn extend(&mut self, other: ReconcileReport) {
        self.changes.extend(other.changes);
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    pub fn applied(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.applied)
    }

    pub fn planned(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| !c.applied)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
