//! Run command - one action run against the configured platform

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::config::{AppConfig, LogFormat};
use crate::domain::{EventName, PlatformClient, ReconcileReport};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::platform::RestPlatformClient;
use crate::infrastructure::services::{run_action, ActionInputs};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository working tree holding the definitions
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Triggering event: push or pull_request
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event: EventName,

    /// Reconcile deployments instead of custom models
    #[arg(long)]
    pub deploy: bool,

    /// Branch whose pushes are applied
    #[arg(long)]
    pub branch: Option<String>,

    #[arg(long)]
    pub allow_model_deletion: bool,

    #[arg(long)]
    pub allow_deployment_deletion: bool,

    /// Platform base URL
    #[arg(long, env = "ML_SYNC__PLATFORM__ENDPOINT")]
    pub endpoint: Option<String>,

    /// Platform API token
    #[arg(long, env = "ML_SYNC__PLATFORM__API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RunArgs, log_format: Option<LogFormat>) -> anyhow::Result<()> {
    let config = super::bootstrap(log_format);

    let client = platform_client(&args, &config)?;
    let inputs = ActionInputs::new(
        &args.repo,
        args.branch.clone().unwrap_or(config.action.branch.clone()),
        args.event,
    )
    .deploy(args.deploy)
    .allow_model_deletion(args.allow_model_deletion || config.action.allow_model_deletion)
    .allow_deployment_deletion(
        args.allow_deployment_deletion || config.action.allow_deployment_deletion,
    );

    info!(repo = %args.repo.display(), event = %args.event, deploy = args.deploy, "Starting action run");
    let report = run_action(&inputs, client).await?;
    print_report(&report, args.json)?;

    Ok(())
}

fn platform_client(args: &RunArgs, config: &AppConfig) -> anyhow::Result<Arc<dyn PlatformClient>> {
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| config.platform.endpoint.clone())
        .context("Platform endpoint is not configured (--endpoint or ML_SYNC__PLATFORM__ENDPOINT)")?;
    let api_token = args
        .api_token
        .clone()
        .or_else(|| config.platform.api_token.clone())
        .context("Platform API token is not configured (--api-token or ML_SYNC__PLATFORM__API_TOKEN)")?;

    let http = HttpClient::with_timeout(Duration::from_secs(config.platform.timeout_secs))?;
    Ok(Arc::new(RestPlatformClient::new(http, endpoint, api_token)))
}

fn print_report(report: &ReconcileReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.is_empty() {
        println!("No changes ({} / {:?})", report.event, report.stage);
        return Ok(());
    }

    for change in &report.changes {
        println!("{}", change);
    }
    Ok(())
}
