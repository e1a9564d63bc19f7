//! End-to-end deployment scenarios
//!
//! Every scenario builds a fresh repository under `workdir`, drives the
//! action through simulated events against `client` and verifies the
//! resulting remote state. Remote resources created along the way are
//! deleted afterwards, also when verification fails.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::cleanup::{with_cleanup, CleanupCoordinator};
use super::driver::EventDriver;
use super::fixtures::{increase_model_memory_by_1mb, TestRepository, MAIN_BRANCH};
use super::scope::{
    temporarily_replace_schema, temporarily_replace_schema_value, upload_and_associate_actuals,
};
use super::verifier::RemoteStateVerifier;
use super::VerificationError;
use crate::domain::{DeploymentDefinition, DeploymentSchema, EventName, PlatformClient, ReconcileReport};

struct Harness {
    fixture: TestRepository,
    driver: EventDriver,
    verifier: RemoteStateVerifier,
    cleanup: CleanupCoordinator,
}

impl Harness {
    async fn new(client: Arc<dyn PlatformClient>, workdir: &Path) -> Result<Self, VerificationError> {
        let fixture = TestRepository::build(workdir).await?;
        let driver = EventDriver::new(fixture.repo.clone(), MAIN_BRANCH, client.clone());
        let verifier = RemoteStateVerifier::new(client.clone());
        let cleanup = CleanupCoordinator::new(client)
            .with_deployment(fixture.git_deployment_id.clone())
            .with_models(fixture.model_ids());

        Ok(Self {
            fixture,
            driver,
            verifier,
            cleanup,
        })
    }

    /// Pushes the models, then the deployment
    async fn create_deployment(&self) -> Result<(), VerificationError> {
        self.driver.push_models().await?;
        self.driver.deploy(EventName::Push).await?;
        self.verifier
            .verify_deployment_presence(&self.fixture.git_deployment_id, true)
            .await
    }

    /// Deploys for `event`; on `push` an actuals dataset is associated for
    /// the duration of the run when the deployment declares actuals
    async fn deploy_with_actuals(&self, event: EventName) -> Result<ReconcileReport, VerificationError> {
        let driver = &self.driver;
        if event.is_dry_run() || !self.fixture.declares_actuals()? {
            return driver.deploy(event).await;
        }

        upload_and_associate_actuals(
            self.driver.client().as_ref(),
            &self.fixture.repo,
            &self.fixture.deployment_yaml,
            &self.fixture.actuals_csv,
            move |dataset_id| async move {
                info!(%dataset_id, "Deploying with actuals dataset");
                driver.deploy(event).await
            },
        )
        .await
    }

    /// Deploys, bumps the deployed model's memory, pushes the new model
    /// version and runs the deployment stage for `event`
    async fn deploy_then_update_model(&self, event: EventName) -> Result<(), VerificationError> {
        self.create_deployment().await?;

        let new_memory = increase_model_memory_by_1mb(&self.fixture.deployed_model().yaml_path)?;
        self.driver
            .commit_all(&format!("Increase memory to {}", new_memory))
            .await?;
        self.driver.push_models().await?;

        self.driver.deploy(event).await?;
        Ok(())
    }
}

/// A deployment exists after `push` and not after `pull_request`
pub async fn deployment_create(
    client: Arc<dyn PlatformClient>,
    workdir: &Path,
    event: EventName,
) -> Result<(), VerificationError> {
    let h = Harness::new(client, workdir).await?;

    with_cleanup(&h.cleanup, async {
        info!(%event, "Scenario: deployment creation");
        h.driver.push_models().await?;
        h.deploy_with_actuals(event).await?;

        h.verifier
            .verify_deployment_created(event, &h.fixture.git_deployment_id)
            .await
    })
    .await
}

/// Without challengers a new model version replaces the primary on `push` only
pub async fn deployment_model_replacement(
    client: Arc<dyn PlatformClient>,
    workdir: &Path,
    event: EventName,
) -> Result<(), VerificationError> {
    let h = Harness::new(client, workdir).await?;

    with_cleanup(&h.cleanup, async {
        info!(%event, "Scenario: model replacement");
        h.fixture.set_challengers_enabled(false).await?;
        h.deploy_then_update_model(event).await?;

        h.verifier
            .verify_model_replacement(
                event,
                &h.fixture.git_deployment_id,
                &h.fixture.deployed_model().git_model_id,
            )
            .await
    })
    .await
}

/// With challengers a new model version becomes a challenger on `push` only
pub async fn deployment_model_challengers(
    client: Arc<dyn PlatformClient>,
    workdir: &Path,
    event: EventName,
) -> Result<(), VerificationError> {
    let h = Harness::new(client, workdir).await?;

    with_cleanup(&h.cleanup, async {
        info!(%event, "Scenario: model challengers");
        h.fixture.set_challengers_enabled(true).await?;
        h.deploy_then_update_model(event).await?;

        h.verifier
            .verify_challengers(
                event,
                &h.fixture.git_deployment_id,
                &h.fixture.deployed_model().git_model_id,
            )
            .await
    })
    .await
}

/// A removed definition deletes its deployment only on an allowed `push`
pub async fn deployment_delete(
    client: Arc<dyn PlatformClient>,
    workdir: &Path,
) -> Result<(), VerificationError> {
    let h = Harness::new(client, workdir).await?;
    let id = &h.fixture.git_deployment_id;

    with_cleanup(&h.cleanup, async {
        info!("Scenario: deployment deletion");
        h.create_deployment().await?;
        h.fixture.remove_deployment_definition().await?;

        h.driver.run(EventName::Push, true, false).await?;
        h.verifier.verify_deployment_presence(id, true).await?;

        h.driver.run(EventName::PullRequest, true, true).await?;
        h.verifier.verify_deployment_presence(id, true).await?;

        h.driver.run(EventName::Push, true, true).await?;
        h.verifier.verify_deployment_presence(id, false).await
    })
    .await
}

/// Label and monitoring settings follow the definition on `push` only
pub async fn deployment_settings(
    client: Arc<dyn PlatformClient>,
    workdir: &Path,
    event: EventName,
) -> Result<(), VerificationError> {
    let h = Harness::new(client, workdir).await?;
    let id = &h.fixture.git_deployment_id;
    let driver = &h.driver;

    with_cleanup(&h.cleanup, async {
        info!(%event, "Scenario: deployment settings");
        h.create_deployment().await?;
        let deployment = h.verifier.deployment(id).await?;

        let old_label = deployment.label.clone();
        let new_label = format!("{} - NEW", old_label);
        temporarily_replace_schema_value(
            &h.fixture.repo,
            &h.fixture.deployment_yaml,
            &[DeploymentSchema::SETTINGS_SECTION_KEY, DeploymentSchema::LABEL_KEY],
            new_label.as_str(),
            move || driver.deploy(event),
        )
        .await?;
        h.verifier
            .verify_label(event, id, &old_label, &new_label)
            .await?;

        let before = h.verifier.settings(&deployment).await?;
        let mut doc = h.fixture.deployment_document()?;
        let settings = |key: &'static str| [DeploymentSchema::SETTINGS_SECTION_KEY, key];

        doc.set_value(
            &settings(DeploymentSchema::ENABLE_TARGET_DRIFT_KEY),
            !before.target_drift.enabled,
        )?;
        // Feature drift needs training data assigned to the deployment
        doc.set_value(&settings(DeploymentSchema::ENABLE_FEATURE_DRIFT_KEY), false)?;
        doc.set_value(
            &[
                DeploymentSchema::SETTINGS_SECTION_KEY,
                DeploymentSchema::SEGMENT_ANALYSIS_KEY,
                DeploymentSchema::ENABLE_SEGMENT_ANALYSIS_KEY,
            ],
            !before.segment_analysis.enabled,
        )?;
        let challengers = !before.challenger_models.enabled;
        doc.set_value(
            &settings(DeploymentSchema::ENABLE_CHALLENGER_MODELS_KEY),
            challengers,
        )?;
        doc.set_value(
            &settings(DeploymentSchema::ENABLE_PREDICTIONS_COLLECTION_KEY),
            challengers,
        )?;
        let declared = DeploymentDefinition::from_document(&doc)?.settings;

        temporarily_replace_schema(
            &h.fixture.repo,
            &h.fixture.deployment_yaml,
            &doc,
            move || driver.deploy(event),
        )
        .await?;
        h.verifier
            .verify_settings(event, &deployment, &before, &declared)
            .await
    })
    .await
}
