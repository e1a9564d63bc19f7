//! ml-metadata-sync
//!
//! Keeps custom models and deployments on a remote ML platform in sync with
//! YAML definitions tracked in git, with:
//! - A model stage and a deployment stage driven by push / pull_request events
//! - REST and in-memory platform clients behind one trait
//! - A reconciliation verifier that replays events and asserts remote state

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod verification;

pub use config::AppConfig;
