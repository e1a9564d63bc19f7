//! Scoped changes to local definitions that are always reverted

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use futures::FutureExt;
use serde_yaml::Value;
use tracing::{debug, warn};

use super::VerificationError;
use crate::domain::{DeploymentSchema, PlatformClient, SchemaDocument};
use crate::infrastructure::git::GitRepository;

/// Applies a change, runs `body`, then runs `restore` with what `apply` saved.
///
/// `restore` runs whether `body` succeeds, fails or panics; a panic is
/// resumed afterwards. An error from `body` takes precedence over one from
/// `restore`.
pub async fn scoped<S, T, E, Apply, ApplyFut, Body, BodyFut, Restore, RestoreFut>(
    apply: Apply,
    body: Body,
    restore: Restore,
) -> Result<T, E>
where
    S: Clone,
    E: std::fmt::Display,
    Apply: FnOnce() -> ApplyFut,
    ApplyFut: Future<Output = Result<S, E>>,
    Body: FnOnce(S) -> BodyFut,
    BodyFut: Future<Output = Result<T, E>>,
    Restore: FnOnce(S) -> RestoreFut,
    RestoreFut: Future<Output = Result<(), E>>,
{
    let saved = apply().await?;
    let outcome = AssertUnwindSafe(body(saved.clone())).catch_unwind().await;
    let restored = restore(saved).await;

    match outcome {
        Err(panic) => {
            if let Err(e) = &restored {
                warn!(error = %e, "Restore failed while unwinding");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(e)) => {
            if let Err(restore_error) = &restored {
                warn!(error = %restore_error, "Restore failed after an error");
            }
            Err(e)
        }
        Ok(Ok(value)) => restored.map(|_| value),
    }
}

/// Sets one value of a YAML definition and commits it for the duration of `body`
pub async fn temporarily_replace_schema_value<T, Body, BodyFut>(
    repo: &GitRepository,
    yaml_path: &Path,
    keys: &[&str],
    new_value: impl Into<Value>,
    body: Body,
) -> Result<T, VerificationError>
where
    Body: FnOnce() -> BodyFut,
    BodyFut: Future<Output = Result<T, VerificationError>>,
{
    let new_value = new_value.into();
    let path = keys.join(".");
    let path = path.as_str();

    scoped(
        move || async move {
            let mut doc = SchemaDocument::load(yaml_path)?;
            let previous = doc.set_value(keys, new_value)?;
            doc.save(yaml_path)?;
            repo.commit_all_if_changed(&format!("Set {}", path)).await?;
            Ok::<_, VerificationError>(previous)
        },
        |_| body(),
        move |previous| async move {
            let mut doc = SchemaDocument::load(yaml_path)?;
            doc.restore_value(keys, previous)?;
            doc.save(yaml_path)?;
            repo.commit_all_if_changed(&format!("Restore {}", path)).await?;
            Ok::<_, VerificationError>(())
        },
    )
    .await
}

/// Replaces a whole YAML definition and commits it for the duration of `body`
pub async fn temporarily_replace_schema<T, Body, BodyFut>(
    repo: &GitRepository,
    yaml_path: &Path,
    replacement: &SchemaDocument,
    body: Body,
) -> Result<T, VerificationError>
where
    Body: FnOnce() -> BodyFut,
    BodyFut: Future<Output = Result<T, VerificationError>>,
{
    scoped(
        move || async move {
            let original = SchemaDocument::load(yaml_path)?;
            replacement.save(yaml_path)?;
            repo.commit_all_if_changed("Replace definition").await?;
            Ok::<_, VerificationError>(original)
        },
        |_| body(),
        move |original: SchemaDocument| async move {
            original.save(yaml_path)?;
            repo.commit_all_if_changed("Restore definition").await?;
            Ok::<_, VerificationError>(())
        },
    )
    .await
}

/// Uploads `dataset_path`, points the deployment's actuals dataset id at it
/// and commits, for the duration of `body`. Afterwards the definition is
/// restored and the dataset deleted.
pub async fn upload_and_associate_actuals<T, Body, BodyFut>(
    client: &dyn PlatformClient,
    repo: &GitRepository,
    deployment_yaml: &Path,
    dataset_path: &Path,
    body: Body,
) -> Result<T, VerificationError>
where
    Body: FnOnce(String) -> BodyFut,
    BodyFut: Future<Output = Result<T, VerificationError>>,
{
    let keys = [
        DeploymentSchema::SETTINGS_SECTION_KEY,
        DeploymentSchema::ASSOCIATION_KEY,
        DeploymentSchema::ASSOCIATION_ACTUALS_DATASET_ID_KEY,
    ];
    let keys = &keys[..];

    scoped(
        move || async move {
            let dataset = client.upload_dataset(dataset_path).await?;
            debug!(dataset_id = %dataset.id, rows = dataset.row_count, "Uploaded actuals dataset");

            let mut doc = SchemaDocument::load(deployment_yaml)?;
            let previous = doc.set_value(keys, dataset.id.as_str())?;
            doc.save(deployment_yaml)?;
            repo.commit_all_if_changed("Associate actuals dataset").await?;
            Ok::<_, VerificationError>((dataset.id, previous))
        },
        |(dataset_id, _): (String, Option<Value>)| body(dataset_id),
        move |(dataset_id, previous): (String, Option<Value>)| async move {
            let mut doc = SchemaDocument::load(deployment_yaml)?;
            doc.restore_value(keys, previous)?;
            doc.save(deployment_yaml)?;
            repo.commit_all_if_changed("Dissociate actuals dataset").await?;
            client.delete_dataset(&dataset_id).await?;
            Ok::<_, VerificationError>(())
        },
    )
    .await
}
