//! Key-based access to model and deployment YAML definitions

use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::DomainError;

/// Keys of a custom model definition
pub struct ModelSchema;

impl ModelSchema {
    pub const MODEL_ID_KEY: &'static str = "git_model_id";
    pub const TARGET_TYPE_KEY: &'static str = "target_type";
    pub const TARGET_NAME_KEY: &'static str = "target_name";
    pub const SETTINGS_SECTION_KEY: &'static str = "settings";
    pub const NAME_KEY: &'static str = "name";
    pub const DESCRIPTION_KEY: &'static str = "description";
    pub const MEMORY_KEY: &'static str = "memory";
    pub const REPLICAS_KEY: &'static str = "replicas";
    pub const VERSION_KEY: &'static str = "version";
    pub const MODEL_ENV_ID_KEY: &'static str = "model_environment_id";
}

/// Keys of a deployment definition
pub struct DeploymentSchema;

impl DeploymentSchema {
    pub const DEPLOYMENT_ID_KEY: &'static str = "git_deployment_id";
    pub const MODEL_ID_KEY: &'static str = "git_model_id";
    pub const SETTINGS_SECTION_KEY: &'static str = "settings";
    pub const LABEL_KEY: &'static str = "label";
    pub const DESCRIPTION_KEY: &'static str = "description";
    pub const IMPORTANCE_KEY: &'static str = "importance";
    pub const ENABLE_TARGET_DRIFT_KEY: &'static str = "enable_target_drift";
    pub const ENABLE_FEATURE_DRIFT_KEY: &'static str = "enable_feature_drift";
    pub const SEGMENT_ANALYSIS_KEY: &'static str = "segment_analysis";
    pub const ENABLE_SEGMENT_ANALYSIS_KEY: &'static str = "enabled";
    pub const SEGMENT_ANALYSIS_ATTRIBUTES_KEY: &'static str = "attributes";
    pub const ENABLE_CHALLENGER_MODELS_KEY: &'static str = "enable_challenger_models";
    pub const ENABLE_PREDICTIONS_COLLECTION_KEY: &'static str = "enable_predictions_collection";
    pub const ASSOCIATION_KEY: &'static str = "association";
    pub const ASSOCIATION_ID_COLUMN_KEY: &'static str = "association_id_column";
    pub const ASSOCIATION_REQUIRED_IN_PRED_REQUEST_KEY: &'static str =
        "required_in_prediction_requests";
    pub const ASSOCIATION_ACTUALS_ID_KEY: &'static str = "actuals_id_column";
    pub const ASSOCIATION_ACTUALS_VALUES_KEY: &'static str = "actual_values_column";
    pub const ASSOCIATION_ACTUALS_DATASET_ID_KEY: &'static str = "actuals_dataset_id";
}

/// A YAML definition document with nested key access.
///
/// The root is always a mapping. Setters create missing intermediate
/// sections and return the value they replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    root: Value,
}

impl SchemaDocument {
    pub fn new() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    pub fn from_value(root: Value) -> Result<Self, DomainError> {
        if !root.is_mapping() {
            return Err(DomainError::schema(
                "Definition root must be a YAML mapping",
            ));
        }
        Ok(Self { root })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DomainError> {
        Self::from_value(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), DomainError> {
        std::fs::write(path, self.to_yaml_string()?).map_err(|e| {
            DomainError::io(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    pub fn to_yaml_string(&self) -> Result<String, DomainError> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.root.get(key).is_some()
    }

    /// Walks `keys` from the root; `None` if any segment is missing
    pub fn get_value(&self, keys: &[&str]) -> Option<&Value> {
        let mut current = &self.root;
        for key in keys {
            current = current.get(*key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, keys: &[&str]) -> Option<&str> {
        self.get_value(keys).and_then(Value::as_str)
    }

    pub fn get_bool(&self, keys: &[&str]) -> Option<bool> {
        self.get_value(keys).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, keys: &[&str]) -> Option<u64> {
        self.get_value(keys).and_then(Value::as_u64)
    }

    /// Sets the value at `keys`, returning the previous one
    pub fn set_value(
        &mut self,
        keys: &[&str],
        value: impl Into<Value>,
    ) -> Result<Option<Value>, DomainError> {
        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| DomainError::schema("Empty key path"))?;

        let mut current = &mut self.root;
        for key in parents {
            if current.is_null() {
                *current = Value::Mapping(Mapping::new());
            }
            let mapping = current.as_mapping_mut().ok_or_else(|| {
                DomainError::schema(format!("Section '{}' is not a mapping", key))
            })?;
            if !mapping.contains_key(*key) {
                mapping.insert(Value::from(*key), Value::Mapping(Mapping::new()));
            }
            current = mapping
                .get_mut(*key)
                .ok_or_else(|| DomainError::schema(format!("Section '{}' vanished", key)))?;
        }

        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        let mapping = current.as_mapping_mut().ok_or_else(|| {
            DomainError::schema(format!("Parent of '{}' is not a mapping", last))
        })?;
        Ok(mapping.insert(Value::from(*last), value.into()))
    }

    /// Removes the value at `keys`, returning it
    pub fn remove_value(&mut self, keys: &[&str]) -> Option<Value> {
        let (last, parents) = keys.split_last()?;
        let mut current = &mut self.root;
        for key in parents {
            current = current.get_mut(*key)?;
        }
        current.as_mapping_mut()?.remove(*last)
    }

    /// Restores a value captured by [`set_value`](Self::set_value)
    pub fn restore_value(
        &mut self,
        keys: &[&str],
        previous: Option<Value>,
    ) -> Result<(), DomainError> {
        match previous {
            Some(value) => {
                self.set_value(keys, value)?;
            }
            None => {
                self.remove_value(keys);
            }
        }
        Ok(())
    }
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENT_YAML: &str = r#"
git_deployment_id: deployment-1
git_model_id: model-1
settings:
  label: My Deployment
  enable_challenger_models: true
  segment_analysis:
    enabled: false
"#;

    #[test]
    fn test_get_nested_values() {
        let doc = SchemaDocument::from_yaml_str(DEPLOYMENT_YAML).unwrap();

        assert_eq!(
            doc.get_str(&[DeploymentSchema::DEPLOYMENT_ID_KEY]),
            Some("deployment-1")
        );
        assert_eq!(
            doc.get_str(&[
                DeploymentSchema::SETTINGS_SECTION_KEY,
                DeploymentSchema::LABEL_KEY
            ]),
            Some("My Deployment")
        );
        assert_eq!(
            doc.get_bool(&[
                DeploymentSchema::SETTINGS_SECTION_KEY,
                DeploymentSchema::SEGMENT_ANALYSIS_KEY,
                DeploymentSchema::ENABLE_SEGMENT_ANALYSIS_KEY
            ]),
            Some(false)
        );
        assert!(doc
            .get_value(&[DeploymentSchema::SETTINGS_SECTION_KEY, "missing"])
            .is_none());
    }

    #[test]
    fn test_set_value_creates_sections() {
        let mut doc = SchemaDocument::from_yaml_str("git_deployment_id: d1\n").unwrap();

        let previous = doc
            .set_value(
                &[
                    DeploymentSchema::SETTINGS_SECTION_KEY,
                    DeploymentSchema::ASSOCIATION_KEY,
                    DeploymentSchema::ASSOCIATION_ACTUALS_DATASET_ID_KEY,
                ],
                "dataset-1",
            )
            .unwrap();

        assert!(previous.is_none());
        assert_eq!(
            doc.get_str(&["settings", "association", "actuals_dataset_id"]),
            Some("dataset-1")
        );
    }

    #[test]
    fn test_set_value_over_null_section() {
        let mut doc = SchemaDocument::from_yaml_str("settings:\n").unwrap();
        doc.set_value(&["settings", "label"], "x").unwrap();
        assert_eq!(doc.get_str(&["settings", "label"]), Some("x"));
    }

    #[test]
    fn test_set_then_restore() {
        let mut doc = SchemaDocument::from_yaml_str(DEPLOYMENT_YAML).unwrap();
        let original = doc.clone();
        let keys = ["settings", "label"];

        let previous = doc.set_value(&keys, "Renamed").unwrap();
        assert_eq!(doc.get_str(&keys), Some("Renamed"));

        doc.restore_value(&keys, previous).unwrap();
        assert_eq!(doc, original);

        let keys = ["settings", "importance"];
        let previous = doc.set_value(&keys, "HIGH").unwrap();
        doc.restore_value(&keys, previous).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_set_value_through_scalar_fails() {
        let mut doc = SchemaDocument::from_yaml_str(DEPLOYMENT_YAML).unwrap();
        let result = doc.set_value(&["git_model_id", "nested"], true);
        assert!(result.is_err());
    }

    #[test]
    fn test_root_must_be_mapping() {
        assert!(SchemaDocument::from_yaml_str("- a\n- b\n").is_err());
    }
}
