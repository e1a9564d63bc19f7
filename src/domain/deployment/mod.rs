//! Deployment domain - deployment definitions

mod entity;

pub use entity::{
    Association, DeploymentDefinition, DeploymentSettings, Importance, SegmentAnalysis,
};
