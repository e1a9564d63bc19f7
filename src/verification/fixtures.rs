//! Local repositories for verification runs

use std::path::{Path, PathBuf};

use super::VerificationError;
use crate::domain::deployment::Association;
use crate::domain::model::{DEFAULT_MODEL_MEMORY, ONE_MB};
use crate::domain::{
    DeploymentDefinition, DeploymentSchema, DeploymentSettings, DomainError, GitId,
    ModelDefinition, ModelSchema, SchemaDocument, TargetType,
};
use crate::infrastructure::git::GitRepository;

pub const MAIN_BRANCH: &str = "main";

const TARGET_NAME: &str = "Grade 2014";
const ASSOCIATION_COLUMN: &str = "Id";

const CUSTOM_PY: &str = "\
import pandas as pd


def load_model(code_dir):
    return \"model\"


def score(data, model, **kwargs):
    return pd.DataFrame({\"Predictions\": [0.0] * len(data)})
";

const ACTUALS_CSV: &str = "\
Id,Grade 2014
1,72
2,65
3,88
4,91
5,58
";

/// A model directory in a [`TestRepository`]
#[derive(Debug, Clone)]
pub struct TestModel {
    pub git_model_id: GitId,
    pub yaml_path: PathBuf,
}

/// A git working tree holding two models and one deployment, all with fresh ids
#[derive(Debug, Clone)]
pub struct TestRepository {
    pub repo: GitRepository,
    pub models: Vec<TestModel>,
    pub git_deployment_id: GitId,
    pub deployment_yaml: PathBuf,
    pub actuals_csv: PathBuf,
}

impl TestRepository {
    /// Writes the definitions under `dir`, initializes git on [`MAIN_BRANCH`]
    /// and commits everything
    pub async fn build(dir: &Path) -> Result<Self, VerificationError> {
        let mut models = Vec::new();
        for (folder, name) in [("model_a", "Regression model A"), ("model_b", "Regression model B")] {
            let git_model_id = GitId::generate("model-id");
            let model_dir = dir.join("models").join(folder);
            std::fs::create_dir_all(&model_dir)?;

            let definition = ModelDefinition::new(git_model_id.clone(), TargetType::Regression, name)
                .with_target_name(TARGET_NAME)
                .with_memory(DEFAULT_MODEL_MEMORY);
            let yaml_path = model_dir.join("model.yaml");
            definition.to_document()?.save(&yaml_path)?;
            std::fs::write(model_dir.join("custom.py"), CUSTOM_PY)?;

            models.push(TestModel {
                git_model_id,
                yaml_path,
            });
        }

        let git_deployment_id = GitId::generate("deployment-id");
        let settings = DeploymentSettings {
            label: Some(format!("Deployment {}", git_deployment_id)),
            association: Some(Association {
                association_id_column: Some(ASSOCIATION_COLUMN.to_string()),
                actuals_id_column: Some(ASSOCIATION_COLUMN.to_string()),
                actual_values_column: Some(TARGET_NAME.to_string()),
                ..Association::default()
            }),
            ..DeploymentSettings::default()
        };
        let deployment = DeploymentDefinition::new(git_deployment_id.clone(), models[0].git_model_id.clone())
            .with_settings(settings);

        let deployment_dir = dir.join("deployments");
        std::fs::create_dir_all(&deployment_dir)?;
        let deployment_yaml = deployment_dir.join("deployment.yaml");
        deployment.to_document()?.save(&deployment_yaml)?;

        let datasets_dir = dir.join("datasets");
        std::fs::create_dir_all(&datasets_dir)?;
        let actuals_csv = datasets_dir.join("actuals.csv");
        std::fs::write(&actuals_csv, ACTUALS_CSV)?;

        let repo = GitRepository::init(dir, MAIN_BRANCH).await?;
        repo.add_all().await?;
        repo.commit("Initial models and deployment").await?;

        Ok(Self {
            repo,
            models,
            git_deployment_id,
            deployment_yaml,
            actuals_csv,
        })
    }

    /// The model the deployment serves
    pub fn deployed_model(&self) -> &TestModel {
        &self.models[0]
    }

    pub fn model_ids(&self) -> Vec<GitId> {
        self.models.iter().map(|m| m.git_model_id.clone()).collect()
    }

    pub fn deployment_document(&self) -> Result<SchemaDocument, VerificationError> {
        Ok(SchemaDocument::load(&self.deployment_yaml)?)
    }

    pub fn deployment_definition(&self) -> Result<DeploymentDefinition, VerificationError> {
        Ok(DeploymentDefinition::from_document(&self.deployment_document()?)?)
    }

    /// Whether the deployment declares an actuals id column
    pub fn declares_actuals(&self) -> Result<bool, VerificationError> {
        let doc = self.deployment_document()?;
        Ok(doc
            .get_str(&[
                DeploymentSchema::SETTINGS_SECTION_KEY,
                DeploymentSchema::ASSOCIATION_KEY,
                DeploymentSchema::ASSOCIATION_ACTUALS_ID_KEY,
            ])
            .is_some())
    }

    /// Sets `enable_challenger_models` and commits
    pub async fn set_challengers_enabled(&self, enabled: bool) -> Result<(), VerificationError> {
        let mut doc = self.deployment_document()?;
        doc.set_value(
            &[
                DeploymentSchema::SETTINGS_SECTION_KEY,
                DeploymentSchema::ENABLE_CHALLENGER_MODELS_KEY,
            ],
            enabled,
        )?;
        doc.save(&self.deployment_yaml)?;
        self.repo
            .commit_all_if_changed(&format!("Set challengers enabled to {}", enabled))
            .await?;
        Ok(())
    }

    /// Removes the deployment definition and commits the deletion
    pub async fn remove_deployment_definition(&self) -> Result<(), VerificationError> {
        std::fs::remove_file(&self.deployment_yaml)?;
        self.repo
            .commit_all("Delete the deployment definition file")
            .await?;
        Ok(())
    }
}

/// Adds 1 MiB to `settings.memory` of a model definition; returns the new value
pub fn increase_model_memory_by_1mb(yaml_path: &Path) -> Result<u64, DomainError> {
    let keys = [ModelSchema::SETTINGS_SECTION_KEY, ModelSchema::MEMORY_KEY];

    let mut doc = SchemaDocument::load(yaml_path)?;
    let memory = doc.get_u64(&keys).unwrap_or(DEFAULT_MODEL_MEMORY) + ONE_MB;
    doc.set_value(&keys, memory)?;
    doc.save(yaml_path)?;
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::local::LocalDefinitions;

    #[tokio::test]
    async fn test_build_produces_scannable_repository() {
        if !GitRepository::is_available().await {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let fixture = TestRepository::build(dir.path()).await.unwrap();

        let definitions = LocalDefinitions::scan(dir.path()).unwrap();
        assert_eq!(definitions.models.len(), 2);
        assert_eq!(definitions.deployments.len(), 1);

        let deployment = fixture.deployment_definition().unwrap();
        assert_eq!(deployment.git_model_id, fixture.deployed_model().git_model_id);
        assert!(fixture.declares_actuals().unwrap());
        assert!(!fixture.repo.has_changes().await.unwrap());
        assert_eq!(fixture.repo.current_branch().await.unwrap(), MAIN_BRANCH);
    }

    #[tokio::test]
    async fn test_ids_are_unique_per_build() {
        if !GitRepository::is_available().await {
            return;
        }

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let a = TestRepository::build(first.path()).await.unwrap();
        let b = TestRepository::build(second.path()).await.unwrap();

        assert_ne!(a.git_deployment_id, b.git_deployment_id);
        assert_ne!(a.model_ids(), b.model_ids());
    }

    #[test]
    fn test_increase_model_memory_by_1mb() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("model.yaml");
        std::fs::write(
            &yaml,
            "git_model_id: m1\ntarget_type: Regression\nsettings:\n  name: M1\n  memory: 268435456\n",
        )
        .unwrap();

        let memory = increase_model_memory_by_1mb(&yaml).unwrap();

        assert_eq!(memory, 268435456 + ONE_MB);
        let doc = SchemaDocument::load(&yaml).unwrap();
        assert_eq!(doc.get_u64(&["settings", "memory"]), Some(memory));
    }

    #[test]
    fn test_increase_model_memory_without_declared_memory() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("model.yaml");
        std::fs::write(&yaml, "git_model_id: m1\ntarget_type: Regression\nsettings:\n  name: M1\n").unwrap();

        assert_eq!(
            increase_model_memory_by_1mb(&yaml).unwrap(),
            DEFAULT_MODEL_MEMORY + ONE_MB
        );
    }
}
