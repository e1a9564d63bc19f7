//! Model stage - custom models and their versions

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::{note, RunContext};
use crate::domain::platform::{
    CreateCustomModelRequest, CreateModelVersionRequest, CustomModel, GitModelVersion,
};
use crate::domain::{ChangeKind, DomainError, GitId, PlatformClient, ReconcileReport, Stage};
use crate::infrastructure::local::{LocalDefinitions, LocalModel};

/// Reconciles local model definitions with remote custom models
#[derive(Debug)]
pub struct ModelSyncService {
    client: Arc<dyn PlatformClient>,
}

impl ModelSyncService {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    pub async fn reconcile(
        &self,
        definitions: &LocalDefinitions,
        ctx: &RunContext,
    ) -> Result<ReconcileReport, DomainError> {
        let mut report = ReconcileReport::new(ctx.event, Stage::Models);

        let remote: HashMap<String, CustomModel> = self
            .client
            .fetch_custom_models()
            .await?
            .into_iter()
            .filter_map(|m| m.git_model_id.clone().map(|id| (id, m)))
            .collect();

        for local in &definitions.models {
            match remote.get(local.definition.git_model_id.as_str()) {
                None => self.create_model(local, ctx, &mut report).await?,
                Some(model) => self.update_model(local, model, ctx, &mut report).await?,
            }
        }

        let mut orphans: Vec<&String> = remote
            .keys()
            .filter(|id| definitions.is_removed_model(id.as_str()))
            .collect();
        orphans.sort();

        for id in orphans {
            let git_id = match GitId::new(id.as_str()) {
                Ok(git_id) => git_id,
                Err(e) => {
                    warn!(git_model_id = %id, error = %e, "Ignoring remote model with an invalid git id");
                    continue;
                }
            };
            if !ctx.allow_model_deletion {
                info!(git_model_id = %git_id, "Model definition removed but deletion is not allowed");
                continue;
            }

            note(
                &mut report,
                ctx.event,
                ChangeKind::DeleteModel,
                &git_id,
                "definition removed",
            );
            if !ctx.event.is_dry_run() {
                self.client.delete_custom_model_by_git_id(&git_id).await?;
            }
        }

        Ok(report)
    }

    async fn create_model(
        &self,
        local: &LocalModel,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let git_id = &local.definition.git_model_id;
        note(
            report,
            ctx.event,
            ChangeKind::CreateModel,
            git_id,
            format!("'{}'", local.definition.settings.name),
        );

        if ctx.event.is_dry_run() {
            return Ok(());
        }

        let model = self
            .client
            .create_custom_model(&CreateCustomModelRequest::from(&local.definition))
            .await?;
        self.client
            .create_custom_model_version(&model.id, &self.version_request(local, ctx))
            .await?;
        Ok(())
    }

    async fn update_model(
        &self,
        local: &LocalModel,
        model: &CustomModel,
        ctx: &RunContext,
        report: &mut ReconcileReport,
    ) -> Result<(), DomainError> {
        let git_id = &local.definition.git_model_id;
        let latest = self
            .client
            .fetch_custom_model_latest_version_by_git_model_id(git_id)
            .await?;

        let latest_digest = latest.as_ref().and_then(|v| v.content_digest());
        if latest_digest == Some(local.digest.as_str()) {
            return Ok(());
        }

        let detail = match &latest {
            Some(version) => format!("content changed since version {}", version.version_number),
            None => "no version yet".to_string(),
        };
        note(report, ctx.event, ChangeKind::CreateModelVersion, git_id, detail);

        if !ctx.event.is_dry_run() {
            self.client
                .create_custom_model_version(&model.id, &self.version_request(local, ctx))
                .await?;
        }
        Ok(())
    }

    fn version_request(&self, local: &LocalModel, ctx: &RunContext) -> CreateModelVersionRequest {
        CreateModelVersionRequest {
            memory: local.definition.memory(),
            replicas: local.definition.replicas(),
            base_environment_id: local.definition.version.model_environment_id.clone(),
            git_model_version: GitModelVersion {
                commit_sha: ctx.commit_sha.clone(),
                ref_name: Some(ctx.ref_name.clone()),
                content_digest: local.digest.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ModelDefinition, TargetType};
    use crate::domain::EventName;
    use crate::infrastructure::local::RemovedDefinitions;
    use crate::infrastructure::platform::InMemoryPlatform;

    fn local_model(id: &str, digest: &str) -> LocalModel {
        LocalModel {
            definition: ModelDefinition::new(
                GitId::new(id).unwrap(),
                TargetType::Regression,
                format!("Model {}", id),
            ),
            yaml_path: format!("models/{}/model.yaml", id).into(),
            digest: digest.to_string(),
        }
    }

    fn definitions(models: Vec<LocalModel>) -> LocalDefinitions {
        LocalDefinitions {
            models,
            ..LocalDefinitions::default()
        }
    }

    fn removed(ids: &[&str]) -> LocalDefinitions {
        LocalDefinitions {
            removed: ids
                .iter()
                .fold(RemovedDefinitions::default(), |removed, id| removed.with_model(*id)),
            ..LocalDefinitions::default()
        }
    }

    async fn seed_model(platform: &InMemoryPlatform, git_model_id: &str) {
        let mut request = CreateCustomModelRequest::from(&ModelDefinition::new(
            GitId::new("placeholder").unwrap(),
            TargetType::Binary,
            "Foreign model",
        ));
        request.git_model_id = git_model_id.to_string();
        platform.create_custom_model(&request).await.unwrap();
    }

    fn ctx(event: EventName) -> RunContext {
        RunContext {
            event,
            commit_sha: Some("abc123".to_string()),
            ref_name: "main".to_string(),
            allow_model_deletion: false,
            allow_deployment_deletion: false,
        }
    }

    #[tokio::test]
    async fn test_push_creates_model_with_first_version() {
        let platform = Arc::new(InMemoryPlatform::new());
        let service = ModelSyncService::new(platform.clone());

        let report = service
            .reconcile(&definitions(vec![local_model("model-1", "d1")]), &ctx(EventName::Push))
            .await
            .unwrap();

        assert_eq!(report.count(ChangeKind::CreateModel), 1);
        let version = platform
            .fetch_custom_model_latest_version_by_git_model_id(&GitId::new("model-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version.content_digest(), Some("d1"));
        assert_eq!(
            version.git_model_version.unwrap().commit_sha.as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn test_pull_request_persists_nothing() {
        let platform = Arc::new(InMemoryPlatform::new());
        let service = ModelSyncService::new(platform.clone());

        let report = service
            .reconcile(
                &definitions(vec![local_model("model-1", "d1")]),
                &ctx(EventName::PullRequest),
            )
            .await
            .unwrap();

        assert_eq!(report.planned().count(), 1);
        assert_eq!(platform.custom_model_count().await, 0);
    }

    #[tokio::test]
    async fn test_changed_digest_creates_new_version_once() {
        let platform = Arc::new(InMemoryPlatform::new());
        let service = ModelSyncService::new(platform.clone());
        let push = ctx(EventName::Push);

        service
            .reconcile(&definitions(vec![local_model("model-1", "d1")]), &push)
            .await
            .unwrap();

        let unchanged = service
            .reconcile(&definitions(vec![local_model("model-1", "d1")]), &push)
            .await
            .unwrap();
        assert!(unchanged.is_empty());

        let changed = service
            .reconcile(&definitions(vec![local_model("model-1", "d2")]), &push)
            .await
            .unwrap();
        assert_eq!(changed.count(ChangeKind::CreateModelVersion), 1);

        let latest = platform
            .fetch_custom_model_latest_version_by_git_model_id(&GitId::new("model-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version_number, 2);
    }

    #[tokio::test]
    async fn test_model_deletion_requires_permission() {
        let platform = Arc::new(InMemoryPlatform::new());
        let service = ModelSyncService::new(platform.clone());
        let mut push = ctx(EventName::Push);

        service
            .reconcile(&definitions(vec![local_model("model-1", "d1")]), &push)
            .await
            .unwrap();

        service.reconcile(&removed(&["model-1"]), &push).await.unwrap();
        assert_eq!(platform.custom_model_count().await, 1);

        push.allow_model_deletion = true;
        let report = service.reconcile(&removed(&["model-1"]), &push).await.unwrap();
        assert_eq!(report.count(ChangeKind::DeleteModel), 1);
        assert_eq!(platform.custom_model_count().await, 0);
    }

    #[tokio::test]
    async fn test_models_never_declared_here_are_left_alone() {
        let platform = Arc::new(InMemoryPlatform::new());
        seed_model(&platform, "other-repo-model").await;
        let service = ModelSyncService::new(platform.clone());
        let mut push = ctx(EventName::Push);
        push.allow_model_deletion = true;

        let report = service
            .reconcile(&definitions(vec![local_model("model-1", "d1")]), &push)
            .await
            .unwrap();

        assert_eq!(report.count(ChangeKind::DeleteModel), 0);
        assert_eq!(platform.custom_model_count().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_remote_git_id_does_not_fail_the_stage() {
        let platform = Arc::new(InMemoryPlatform::new());
        seed_model(&platform, "team/other model").await;
        let service = ModelSyncService::new(platform.clone());
        let mut push = ctx(EventName::Push);
        push.allow_model_deletion = true;

        let mut defs = definitions(vec![local_model("model-1", "d1")]);
        defs.removed = RemovedDefinitions::default().with_model("team/other model");
        let report = service.reconcile(&defs, &push).await.unwrap();

        assert_eq!(report.count(ChangeKind::CreateModel), 1);
        assert_eq!(report.count(ChangeKind::DeleteModel), 0);
        assert_eq!(platform.custom_model_count().await, 2);
    }
}
