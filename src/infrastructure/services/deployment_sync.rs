//! Deployment stage - deployments, their settings, challengers and actuals

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{note, RunContext};
use crate::domain::platform::{
    ActualsFromDatasetRequest, AssociationIdSetting, CreateDeploymentRequest, Deployment,
    DeploymentInfoUpdate, DeploymentSettingsSnapshot, DeploymentSettingsUpdate, EnabledSetting,
    ModelVersion, SegmentAnalysisSetting,
};
use crate::domain::{
    ChangeKind, DeploymentDefinition, DeploymentSettings, DomainError, GitId, PlatformClient,
    ReconcileReport, Stage,
};
use crate::infrastructure::local::LocalDefinitions;

/// Reconciles local deployment definitions with remote deployments
#[derive(Debug)]
pub struct DeploymentSyncService {
    client: Arc<dyn PlatformClient>,
}

impl DeploymentSyncService {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    pub async fn reconcile(
        &self,
        definitions: &LocalDefinitions,
        ctx: &RunContext,
    ) -> Result<ReconcileReport, DomainError> {
        let mut report = ReconcileReport::new(ctx.event, Stage::Deployments);
        let remote = self.client.fetch_deployments().await?;

        for local in &definitions.deployments {
            let definition = &local.definition;
            let latest = self
                .client
                .fetch_custom_model_latest_version_by_git_model_id(&definition.git_model_id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found(format!(
                        "Model '{}' referenced by deployment '{}' has no version on the platform",
                        definition.git_model_id, definition.git_deployment_id
                    ))
                })?;

            let existing = remote.iter().find(|d| {
                d.git_deployment_id.as_deref() == Some(definition.git_deployment_id.as_str())
            });

            match existing {
                None => {
                    self.create_deployment(definition, &latest, ctx, &mut report)
                        .await?
                }
                Some(deployment) => {
                    self.update_deployment(definition, deployment, &latest, ctx, &mut report)
                        .await?
                }
            }
        }

        self.delete_orphans(definitions, &remote, ctx, &mut report)
            .await?;

        Ok(report)
    }

    async fn create_deployment(
        &self,
        definition: &DeploymentDefinition,
        latest: &ModelVersion,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let git_id = &definition.git_deployment_id;
        note(
            report,
            ctx.event,
            ChangeKind::CreateDeployment,
            git_id,
            format!("'{}' from version {}", definition.label(), latest.id),
        );

        if ctx.event.is_dry_run() {
            if definition.actuals_dataset_id().is_some() {
                note(report, ctx.event, ChangeKind::SubmitActuals, git_id, "new deployment");
            }
            return Ok(());
        }

        let deployment = self
            .client
            .create_deployment(&CreateDeploymentRequest::from_definition(definition, &latest.id))
            .await?;

        let current = self.client.fetch_deployment_settings(&deployment.id).await?;
        let update = settings_update(&definition.settings, &current);
        if !update.is_empty() {
            self.client
                .update_deployment_settings(&deployment.id, &update)
                .await?;
        }

        if definition.settings.enable_challenger_models {
            self.client
                .add_challenger(&deployment.id, &latest.id, &challenger_name(definition, latest))
                .await?;
        }

        self.submit_actuals(definition, &deployment, ctx, report)
            .await
    }

    async fn update_deployment(
        &self,
        definition: &DeploymentDefinition,
        deployment: &Deployment,
        latest: &ModelVersion,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let git_id = &definition.git_deployment_id;
        let apply = !ctx.event.is_dry_run();

        let info = info_update(definition, deployment);
        if !info.is_empty() {
            note(report, ctx.event, ChangeKind::UpdateDeploymentInfo, git_id, describe_info(&info));
            if apply {
                self.client
                    .update_deployment_info(&deployment.id, &info)
                    .await?;
            }
        }

        let current = self.client.fetch_deployment_settings(&deployment.id).await?;
        let update = settings_update(&definition.settings, &current);
        if !update.is_empty() {
            note(
                report,
                ctx.event,
                ChangeKind::UpdateDeploymentSettings,
                git_id,
                update.changed_settings().join(", "),
            );
            if apply {
                self.client
                    .update_deployment_settings(&deployment.id, &update)
                    .await?;
            }
        }

        if deployment.model_version_id() != latest.id {
            if definition.settings.enable_challenger_models {
                self.challenge(definition, deployment, latest, ctx, report)
                    .await?;
            } else {
                note(
                    report,
                    ctx.event,
                    ChangeKind::ReplaceModel,
                    git_id,
                    format!("{} -> {}", deployment.model_version_id(), latest.id),
                );
                if apply {
                    self.client
                        .replace_deployment_model(&deployment.id, &latest.id)
                        .await?;
                }
            }
        }

        self.submit_actuals(definition, deployment, ctx, report)
            .await
    }

    /// Attaches the latest version as a challenger unless already attached
    async fn challenge(
        &self,
        definition: &DeploymentDefinition,
        deployment: &Deployment,
        latest: &ModelVersion,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let challengers = self.client.fetch_challengers(&deployment.id).await?;
        if challengers.iter().any(|c| c.model.id == latest.id) {
            return Ok(());
        }

        note(
            report,
            ctx.event,
            ChangeKind::AddChallenger,
            &definition.git_deployment_id,
            format!("version {}", latest.id),
        );
        if ctx.event.is_dry_run() {
            return Ok(());
        }

        self.client
            .add_challenger(&deployment.id, &latest.id, &challenger_name(definition, latest))
            .await
            .map(|_| ())
    }

    async fn submit_actuals(
        &self,
        definition: &DeploymentDefinition,
        deployment: &Deployment,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let Some(dataset_id) = definition.actuals_dataset_id() else {
            return Ok(());
        };

        let submitted = self
            .client
            .fetch_actuals_dataset_ids(&deployment.id)
            .await?;
        if submitted.iter().any(|id| id == dataset_id) {
            debug!(deployment_id = %deployment.id, dataset_id, "Actuals already submitted");
            return Ok(());
        }

        let association = definition.settings.association.clone().unwrap_or_default();
        let association_id_column = association.actuals_id_column.ok_or_else(|| {
            DomainError::validation(format!(
                "Deployment '{}' declares an actuals dataset without an actuals id column",
                definition.git_deployment_id
            ))
        })?;

        note(
            report,
            ctx.event,
            ChangeKind::SubmitActuals,
            &definition.git_deployment_id,
            format!("dataset {}", dataset_id),
        );
        if ctx.event.is_dry_run() {
            return Ok(());
        }

        self.client
            .submit_actuals_from_dataset(
                &deployment.id,
                &ActualsFromDatasetRequest {
                    dataset_id: dataset_id.to_string(),
                    association_id_column,
                    actual_value_column: association.actual_values_column,
                },
            )
            .await
    }

    async fn delete_orphans(
        &self,
        definitions: &LocalDefinitions,
        remote: &[Deployment],
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        for deployment in remote {
            let Some(id) = deployment.git_deployment_id.as_deref() else {
                continue;
            };
            if !definitions.is_removed_deployment(id) {
                continue;
            }

            let git_id = match GitId::new(id) {
                Ok(git_id) => git_id,
                Err(e) => {
                    warn!(git_deployment_id = %id, error = %e, "Ignoring remote deployment with an invalid git id");
                    continue;
                }
            };
            if !ctx.allow_deployment_deletion {
                info!(git_deployment_id = %git_id, "Deployment definition removed but deletion is not allowed");
                report.record(
                    ChangeKind::SkipDeletion,
                    &git_id,
                    "deployment deletion is not allowed",
                    false,
                );
                continue;
            }

            note(
                report,
                ctx.event,
                ChangeKind::DeleteDeployment,
                &git_id,
                format!("'{}'", deployment.label),
            );
            if !ctx.event.is_dry_run() {
                self.client.delete_deployment_by_git_id(&git_id).await?;
            }
        }

        Ok(())
    }
}

fn challenger_name(definition: &DeploymentDefinition, version: &ModelVersion) -> String {
    format!("{} v{}", definition.label(), version.version_number)
}

fn info_update(definition: &DeploymentDefinition, deployment: &Deployment) -> DeploymentInfoUpdate {
    let settings = &definition.settings;
    let mut update = DeploymentInfoUpdate::default();

    if definition.label() != deployment.label {
        update.label = Some(definition.label().to_string());
    }
    if settings.description.is_some() && settings.description != deployment.description {
        update.description = settings.description.clone();
    }
    if settings.importance.is_some() && settings.importance != deployment.importance {
        update.importance = settings.importance;
    }
    update
}

fn describe_info(update: &DeploymentInfoUpdate) -> String {
    let mut fields = Vec::new();
    if let Some(label) = &update.label {
        fields.push(format!("label '{}'", label));
    }
    if update.description.is_some() {
        fields.push("description".to_string());
    }
    if let Some(importance) = update.importance {
        fields.push(format!("importance {:?}", importance));
    }
    fields.join(", ")
}

/// Settings that must change for the remote snapshot to match the definition
pub fn settings_update(
    desired: &DeploymentSettings,
    current: &DeploymentSettingsSnapshot,
) -> DeploymentSettingsUpdate {
    let mut update = DeploymentSettingsUpdate::default();

    if current.target_drift.enabled != desired.enable_target_drift {
        update.target_drift = Some(EnabledSetting::new(desired.enable_target_drift));
    }
    if current.feature_drift.enabled != desired.enable_feature_drift {
        update.feature_drift = Some(EnabledSetting::new(desired.enable_feature_drift));
    }

    let segment_analysis = SegmentAnalysisSetting {
        enabled: desired.segment_analysis.enabled,
        attributes: desired.segment_analysis.attributes.clone(),
    };
    if current.segment_analysis != segment_analysis {
        update.segment_analysis = Some(segment_analysis);
    }

    if current.challenger_models.enabled != desired.enable_challenger_models {
        update.challenger_models = Some(EnabledSetting::new(desired.enable_challenger_models));
    }
    if current.predictions_data_collection.enabled != desired.enable_predictions_collection {
        update.predictions_data_collection =
            Some(EnabledSetting::new(desired.enable_predictions_collection));
    }

    let association = desired
        .association
        .as_ref()
        .map(|a| AssociationIdSetting {
            column_names: a.association_id_column.iter().cloned().collect(),
            required_in_prediction_requests: a.required_in_prediction_requests,
        })
        .unwrap_or_default();
    if current.association_id != association {
        update.association_id = Some(association);
    }

    update
}
