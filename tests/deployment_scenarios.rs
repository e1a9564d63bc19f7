//! Deployment scenarios against the in-memory platform

use std::sync::Arc;

use ml_metadata_sync::domain::platform::{
    Challenger, CreateCustomModelRequest, CreateDeploymentRequest, CreateModelVersionRequest,
    Deployment, DeploymentSettingsSnapshot, GitModelVersion, ModelVersion,
};
use ml_metadata_sync::domain::{EventName, PlatformClient, TargetType};
use ml_metadata_sync::infrastructure::git::GitRepository;
use ml_metadata_sync::infrastructure::platform::InMemoryPlatform;
use ml_metadata_sync::verification::{scenarios, EventDriver, TestRepository, MAIN_BRANCH};

const EVENTS: [EventName; 2] = [EventName::Push, EventName::PullRequest];

fn platform() -> (Arc<InMemoryPlatform>, Arc<dyn PlatformClient>) {
    let platform = Arc::new(InMemoryPlatform::new());
    let client: Arc<dyn PlatformClient> = platform.clone();
    (platform, client)
}

async fn assert_clean(platform: &InMemoryPlatform) {
    assert_eq!(platform.deployment_count().await, 0, "deployments left behind");
    assert_eq!(platform.custom_model_count().await, 0, "models left behind");
    assert_eq!(platform.dataset_count().await, 0, "datasets left behind");
}

const FOREIGN_DEPLOYMENTS: [&str; 2] = ["other-run-deployment", "team/other deployment"];

/// Creates a model and deployments owned by some other repository
async fn seed_foreign_resources(client: &dyn PlatformClient) {
    let model = client
        .create_custom_model(&CreateCustomModelRequest {
            git_model_id: "other-run-model".to_string(),
            name: "Other run".to_string(),
            description: None,
            target_type: TargetType::Regression,
            target_name: None,
        })
        .await
        .unwrap();
    let version = client
        .create_custom_model_version(
            &model.id,
            &CreateModelVersionRequest {
                memory: 256 * 1024 * 1024,
                replicas: 1,
                base_environment_id: None,
                git_model_version: GitModelVersion {
                    commit_sha: None,
                    ref_name: None,
                    content_digest: "other".to_string(),
                },
            },
        )
        .await
        .unwrap();

    for git_deployment_id in FOREIGN_DEPLOYMENTS {
        client
            .create_deployment(&CreateDeploymentRequest {
                git_deployment_id: git_deployment_id.to_string(),
                custom_model_version_id: version.id.clone(),
                label: git_deployment_id.to_string(),
                description: None,
                importance: None,
            })
            .await
            .unwrap();
    }
}

async fn assert_foreign_resources_intact(platform: &InMemoryPlatform) {
    let mut remaining: Vec<String> = platform
        .fetch_deployments()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|d| d.git_deployment_id)
        .collect();
    remaining.sort();

    assert_eq!(remaining, FOREIGN_DEPLOYMENTS.map(String::from).to_vec());
    assert_eq!(platform.custom_model_count().await, 1, "only the foreign model is left");
}

#[tokio::test]
async fn deployment_create() {
    if !GitRepository::is_available().await {
        return;
    }

    for event in EVENTS {
        let (platform, client) = platform();
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_create(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_clean(&platform).await;
    }
}

#[tokio::test]
async fn deployment_model_replacement() {
    if !GitRepository::is_available().await {
        return;
    }

    for event in EVENTS {
        let (platform, client) = platform();
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_model_replacement(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_clean(&platform).await;
    }
}

#[tokio::test]
async fn deployment_model_challengers() {
    if !GitRepository::is_available().await {
        return;
    }

    for event in EVENTS {
        let (platform, client) = platform();
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_model_challengers(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_clean(&platform).await;
    }
}

#[tokio::test]
async fn deployment_delete() {
    if !GitRepository::is_available().await {
        return;
    }

    let (platform, client) = platform();
    let dir = tempfile::tempdir().unwrap();

    scenarios::deployment_delete(client, dir.path()).await.unwrap();
    assert_clean(&platform).await;
}

#[tokio::test]
async fn deployment_settings() {
    if !GitRepository::is_available().await {
        return;
    }

    for event in EVENTS {
        let (platform, client) = platform();
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_settings(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_clean(&platform).await;
    }
}

#[tokio::test]
async fn deletion_spares_deployments_of_other_repositories() {
    if !GitRepository::is_available().await {
        return;
    }

    let (platform, client) = platform();
    seed_foreign_resources(client.as_ref()).await;
    let dir = tempfile::tempdir().unwrap();

    scenarios::deployment_delete(client, dir.path()).await.unwrap();

    assert_foreign_resources_intact(&platform).await;
}

#[tokio::test]
async fn foreign_git_ids_do_not_break_either_stage() {
    if !GitRepository::is_available().await {
        return;
    }

    for event in EVENTS {
        let (platform, client) = platform();
        seed_foreign_resources(client.as_ref()).await;
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_create(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_foreign_resources_intact(&platform).await;
    }
}

#[tokio::test]
async fn actuals_are_uploaded_on_push_only() {
    if !GitRepository::is_available().await {
        return;
    }

    for (event, uploads) in [(EventName::Push, 1), (EventName::PullRequest, 0)] {
        let (platform, client) = platform();
        let dir = tempfile::tempdir().unwrap();

        scenarios::deployment_create(client, dir.path(), event)
            .await
            .unwrap_or_else(|e| panic!("{}: {}", event, e));
        assert_eq!(platform.uploaded_dataset_count().await, uploads, "{}", event);
        assert_clean(&platform).await;
    }
}

#[tokio::test]
async fn pull_request_leaves_existing_deployment_untouched() {
    if !GitRepository::is_available().await {
        return;
    }

    let (_platform, client) = platform();
    let dir = tempfile::tempdir().unwrap();
    let fixture = TestRepository::build(dir.path()).await.unwrap();
    let driver = EventDriver::new(fixture.repo.clone(), MAIN_BRANCH, client.clone());

    driver.push_models().await.unwrap();
    driver.deploy(EventName::Push).await.unwrap();
    let before = RemoteSnapshot::take(client.as_ref(), &fixture).await;

    ml_metadata_sync::verification::increase_model_memory_by_1mb(
        &fixture.deployed_model().yaml_path,
    )
    .unwrap();
    driver.commit_all("Bump memory").await.unwrap();

    let mut doc = fixture.deployment_document().unwrap();
    doc.set_value(&["settings", "label"], "Changed in a pull request").unwrap();
    doc.set_value(&["settings", "enable_target_drift"], false).unwrap();
    doc.save(&fixture.deployment_yaml).unwrap();
    driver.commit_all("Change deployment settings").await.unwrap();

    let models = driver.run(EventName::PullRequest, false, false).await.unwrap();
    let deployments = driver.deploy(EventName::PullRequest).await.unwrap();
    assert!(models.planned().count() > 0);
    assert!(deployments.planned().count() > 0);
    assert_eq!(models.applied().count(), 0);
    assert_eq!(deployments.applied().count(), 0);

    let after = RemoteSnapshot::take(client.as_ref(), &fixture).await;
    assert_eq!(before, after);
}

/// Everything observable about the fixture's deployment and model
#[derive(Debug, PartialEq)]
struct RemoteSnapshot {
    deployment: Deployment,
    settings: DeploymentSettingsSnapshot,
    challengers: Vec<Challenger>,
    latest_version: ModelVersion,
}

impl RemoteSnapshot {
    async fn take(client: &dyn PlatformClient, fixture: &TestRepository) -> Self {
        let deployment = client
            .fetch_deployment_by_git_id(&fixture.git_deployment_id)
            .await
            .unwrap()
            .unwrap();
        let settings = client.fetch_deployment_settings(&deployment.id).await.unwrap();
        let challengers = client.fetch_challengers(&deployment.id).await.unwrap();
        let latest_version = client
            .fetch_custom_model_latest_version_by_git_model_id(&fixture.deployed_model().git_model_id)
            .await
            .unwrap()
            .unwrap();

        Self {
            deployment,
            settings,
            challengers,
            latest_version,
        }
    }
}
