use clap::Parser;
use ml_metadata_sync::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(args, cli.log_format).await,
        Command::Validate(args) => cli::validate::run(args, cli.log_format).await,
    }
}
