//! Domain layer - definitions, remote resources and the platform contract

pub mod change;
pub mod deployment;
pub mod error;
pub mod event;
pub mod git_id;
pub mod model;
pub mod platform;
pub mod schema;

pub use change::{Change, ChangeKind, ReconcileReport, Stage};
pub use deployment::{DeploymentDefinition, DeploymentSettings};
pub use error::DomainError;
pub use event::EventName;
pub use git_id::GitId;
pub use model::{ModelDefinition, TargetType};
pub use platform::PlatformClient;
pub use schema::{DeploymentSchema, ModelSchema, SchemaDocument};
