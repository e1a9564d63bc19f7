//! Validate command - parses local definitions and checks cross references

use std::path::PathBuf;

use clap::Args;
use tracing::warn;

use crate::config::LogFormat;
use crate::infrastructure::local::LocalDefinitions;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Repository working tree holding the definitions
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

pub async fn run(args: ValidateArgs, log_format: Option<LogFormat>) -> anyhow::Result<()> {
    super::bootstrap(log_format);

    let root = args.repo.clone();
    let definitions = tokio::task::spawn_blocking(move || LocalDefinitions::scan(&root)).await??;

    for model in &definitions.models {
        println!(
            "model      {:<40} {}",
            model.definition.git_model_id,
            model.yaml_path.display()
        );
    }

    let mut dangling = 0;
    for deployment in &definitions.deployments {
        let definition = &deployment.definition;
        println!(
            "deployment {:<40} {}",
            definition.git_deployment_id,
            deployment.yaml_path.display()
        );

        if definitions.model(&definition.git_model_id).is_none() {
            warn!(
                git_deployment_id = %definition.git_deployment_id,
                git_model_id = %definition.git_model_id,
                "Deployment references a model that is not defined locally"
            );
            dangling += 1;
        }
    }

    println!(
        "{} model(s), {} deployment(s), {} dangling reference(s)",
        definitions.models.len(),
        definitions.deployments.len(),
        dangling
    );
    Ok(())
}
