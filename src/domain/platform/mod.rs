//! Platform domain - remote resources and the client contract

mod client;
mod entity;

pub use client::{
    ActualsFromDatasetRequest, CreateCustomModelRequest, CreateDeploymentRequest,
    CreateModelVersionRequest, DeploymentInfoUpdate, DeploymentSettingsUpdate, PlatformClient,
};
#[cfg(test)]
pub use client::MockPlatformClient;
pub use entity::{
    AssociationIdSetting, Challenger, ChallengerModel, CustomModel, CustomModelImage, Dataset,
    DeployedModel, Deployment, DeploymentSettingsSnapshot, EnabledSetting, GitModelVersion,
    ModelVersion, SegmentAnalysisSetting,
};
