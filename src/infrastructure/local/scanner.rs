//! Discovery of model and deployment definitions in a working tree

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::digest::{collect_files, model_digest};
use super::history::RemovedDefinitions;
use crate::domain::{
    DeploymentDefinition, DeploymentSchema, DomainError, GitId, ModelDefinition, ModelSchema,
    SchemaDocument,
};

/// A model definition found in the tree
#[derive(Debug, Clone)]
pub struct LocalModel {
    pub definition: ModelDefinition,
    pub yaml_path: PathBuf,
    pub digest: String,
}

/// A deployment definition found in the tree
#[derive(Debug, Clone)]
pub struct LocalDeployment {
    pub definition: DeploymentDefinition,
    pub yaml_path: PathBuf,
}

/// Every definition under a repository root
#[derive(Debug, Clone, Default)]
pub struct LocalDefinitions {
    pub models: Vec<LocalModel>,
    pub deployments: Vec<LocalDeployment>,
    /// Filled from git history by the action; empty after a plain scan
    pub removed: RemovedDefinitions,
}

impl LocalDefinitions {
    /// Scans `root` for `*.yaml` / `*.yml` definitions.
    ///
    /// A document with `git_deployment_id` is a deployment, otherwise one
    /// with `git_model_id` is a model. Other YAML files are ignored.
    pub fn scan(root: &Path) -> Result<Self, DomainError> {
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        let mut model_docs = Vec::new();
        let mut deployments = Vec::new();

        for path in files.into_iter().filter(|p| is_yaml(p)) {
            let doc = match SchemaDocument::load(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable YAML file");
                    continue;
                }
            };

            if doc.contains_key(DeploymentSchema::DEPLOYMENT_ID_KEY) {
                let definition = DeploymentDefinition::from_document(&doc).map_err(|e| {
                    DomainError::validation(format!("{}: {}", path.display(), e))
                })?;
                deployments.push(LocalDeployment {
                    definition,
                    yaml_path: path,
                });
            } else if doc.contains_key(ModelSchema::MODEL_ID_KEY) {
                let definition = ModelDefinition::from_document(&doc).map_err(|e| {
                    DomainError::validation(format!("{}: {}", path.display(), e))
                })?;
                model_docs.push((definition, path));
            }
        }

        let definition_paths: HashSet<PathBuf> = model_docs
            .iter()
            .map(|(_, p)| p.clone())
            .chain(deployments.iter().map(|d| d.yaml_path.clone()))
            .collect();

        let mut models = Vec::with_capacity(model_docs.len());
        for (definition, yaml_path) in model_docs {
            let digest = model_digest(&yaml_path, &definition_paths)?;
            models.push(LocalModel {
                definition,
                yaml_path,
                digest,
            });
        }

        let definitions = Self {
            models,
            deployments,
            removed: RemovedDefinitions::default(),
        };
        definitions.check_unique_ids()?;

        debug!(
            root = %root.display(),
            models = definitions.models.len(),
            deployments = definitions.deployments.len(),
            "Scanned local definitions"
        );
        Ok(definitions)
    }

    pub fn model(&self, git_model_id: &GitId) -> Option<&LocalModel> {
        self.models
            .iter()
            .find(|m| &m.definition.git_model_id == git_model_id)
    }

    pub fn deployment(&self, git_deployment_id: &GitId) -> Option<&LocalDeployment> {
        self.deployments
            .iter()
            .find(|d| &d.definition.git_deployment_id == git_deployment_id)
    }

    pub fn model_ids(&self) -> HashSet<&GitId> {
        self.models.iter().map(|m| &m.definition.git_model_id).collect()
    }

    pub fn deployment_ids(&self) -> HashSet<&GitId> {
        self.deployments
            .iter()
            .map(|d| &d.definition.git_deployment_id)
            .collect()
    }

    /// A remote model is ours to delete when its definition was removed
    /// and no current definition declares it again
    pub fn is_removed_model(&self, git_model_id: &str) -> bool {
        self.removed.contains_model(git_model_id)
            && !self.models.iter().any(|m| m.definition.git_model_id.as_str() == git_model_id)
    }

    pub fn is_removed_deployment(&self, git_deployment_id: &str) -> bool {
        self.removed.contains_deployment(git_deployment_id)
            && !self
                .deployments
                .iter()
                .any(|d| d.definition.git_deployment_id.as_str() == git_deployment_id)
    }

    fn check_unique_ids(&self) -> Result<(), DomainError> {
        let mut seen: HashMap<&GitId, &Path> = HashMap::new();
        for model in &self.models {
            if let Some(other) = seen.insert(&model.definition.git_model_id, &model.yaml_path) {
                return Err(duplicate_id(&model.definition.git_model_id, other, &model.yaml_path));
            }
        }

        let mut seen: HashMap<&GitId, &Path> = HashMap::new();
        for deployment in &self.deployments {
            let id = &deployment.definition.git_deployment_id;
            if let Some(other) = seen.insert(id, &deployment.yaml_path) {
                return Err(duplicate_id(id, other, &deployment.yaml_path));
            }
        }

        Ok(())
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn duplicate_id(id: &GitId, first: &Path, second: &Path) -> DomainError {
    DomainError::validation(format!(
        "Git id '{}' is declared in both {} and {}",
        id,
        first.display(),
        second.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_YAML: &str = "git_model_id: model-1\ntarget_type: Regression\nsettings:\n  name: Model 1\n";
    const DEPLOYMENT_YAML: &str = "git_deployment_id: deployment-1\ngit_model_id: model-1\n";

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_classifies_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "models/m1/model.yaml", MODEL_YAML);
        write(dir.path(), "models/m1/custom.py", "def load_model(): ...\n");
        write(dir.path(), "deployments/deployment.yml", DEPLOYMENT_YAML);
        write(dir.path(), ".github/workflows/ci.yaml", "on: push\n");
        write(dir.path(), "other.yaml", "unrelated: true\n");

        let defs = LocalDefinitions::scan(dir.path()).unwrap();

        assert_eq!(defs.models.len(), 1);
        assert_eq!(defs.deployments.len(), 1);

        let model_id = GitId::new("model-1").unwrap();
        let model = defs.model(&model_id).unwrap();
        assert!(model.yaml_path.ends_with("models/m1/model.yaml"));
        assert_eq!(model.digest.len(), 64);

        let deployment_id = GitId::new("deployment-1").unwrap();
        assert!(defs.deployment_ids().contains(&deployment_id));
    }

    #[test]
    fn test_scan_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/model.yaml", MODEL_YAML);
        write(dir.path(), "b/model.yaml", MODEL_YAML);

        let result = LocalDefinitions::scan(dir.path());
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_scan_rejects_invalid_definition() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.yaml", "git_model_id: model-1\n");

        assert!(LocalDefinitions::scan(dir.path()).is_err());
    }

    #[test]
    fn test_deployment_next_to_model_does_not_change_digest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m1/model.yaml", MODEL_YAML);
        let before = LocalDefinitions::scan(dir.path()).unwrap().models[0]
            .digest
            .clone();

        write(dir.path(), "m1/deployment.yaml", DEPLOYMENT_YAML);
        let after = LocalDefinitions::scan(dir.path()).unwrap();

        assert_eq!(after.models[0].digest, before);
        assert_eq!(after.deployments.len(), 1);
    }
}
