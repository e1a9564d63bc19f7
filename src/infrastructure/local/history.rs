//! Definitions this repository declared once and has since removed

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use super::scanner::is_yaml;
use crate::domain::{DeploymentSchema, DomainError, ModelSchema, SchemaDocument};
use crate::infrastructure::git::GitRepository;

/// Git ids whose definition file was deleted somewhere in the history of HEAD.
///
/// Only remote resources carrying one of these ids are candidates for
/// deletion; anything else on the platform belongs to someone else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedDefinitions {
    pub model_ids: BTreeSet<String>,
    pub deployment_ids: BTreeSet<String>,
}

impl RemovedDefinitions {
    /// Reads every deleted YAML file at the revision before its deletion
    pub async fn from_history(repo: &GitRepository) -> Result<Self, DomainError> {
        let mut removed = Self::default();

        for (commit, path) in repo.deleted_files().await? {
            if !is_yaml(Path::new(&path)) {
                continue;
            }

            let content = match repo.show_file(&format!("{}^", commit), &path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(%commit, %path, error = %e, "Cannot read removed definition");
                    continue;
                }
            };
            let doc = match SchemaDocument::from_yaml_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(%commit, %path, error = %e, "Removed file is not a definition");
                    continue;
                }
            };

            if let Some(id) = doc.get_str(&[DeploymentSchema::DEPLOYMENT_ID_KEY]) {
                removed.deployment_ids.insert(id.to_string());
            } else if let Some(id) = doc.get_str(&[ModelSchema::MODEL_ID_KEY]) {
                removed.model_ids.insert(id.to_string());
            }
        }

        debug!(
            models = removed.model_ids.len(),
            deployments = removed.deployment_ids.len(),
            "Removed definitions in history"
        );
        Ok(removed)
    }

    pub fn with_model(mut self, git_model_id: impl Into<String>) -> Self {
        self.model_ids.insert(git_model_id.into());
        self
    }

    pub fn with_deployment(mut self, git_deployment_id: impl Into<String>) -> Self {
        self.deployment_ids.insert(git_deployment_id.into());
        self
    }

    pub fn contains_model(&self, git_model_id: &str) -> bool {
        self.model_ids.contains(git_model_id)
    }

    pub fn contains_deployment(&self, git_deployment_id: &str) -> bool {
        self.deployment_ids.contains(git_deployment_id)
    }
}
