//! Model domain - custom model definitions

mod entity;
mod validation;

pub use entity::{
    ModelDefinition, ModelSettings, ModelVersionSettings, TargetType, DEFAULT_MODEL_MEMORY, ONE_MB,
};
pub use validation::{validate_model_definition, ModelValidationError, MIN_MODEL_MEMORY};
