//! Configuration I/O (YAML loading)
//!
//! Schema v1:
//!
//! ```yaml
//! version: 1
//! preset: balanced
//! overrides:
//!   enable_malloc_failure: true
//!   guess_size: 8
//! ```
//!
//! Overrides are applied field by field on top of the preset.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::smg_options::SmgOptions;
use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmgConfigFileV1 {
    /// Schema version (always 1 for v1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Base preset
    pub preset: String,

    /// Field-level overrides on top of the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<serde_yaml::Mapping>,
}

const SUPPORTED_VERSIONS: &[u32] = &[1];

impl SmgOptions {
    /// Load options from a YAML file
    pub fn from_yaml(path: &str) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load options from YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: SmgConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let preset: Preset = file.preset.parse()?;
        let base = SmgOptions::from_preset(preset);

        let options = match file.overrides {
            None => base,
            Some(overrides) => {
                let mut merged = match serde_yaml::to_value(&base)? {
                    serde_yaml::Value::Mapping(mapping) => mapping,
                    _ => {
                        return Err(ConfigError::Custom(
                            "options did not serialize to a mapping".to_string(),
                        ))
                    }
                };
                for (key, value) in overrides {
                    if !merged.contains_key(&key) {
                        return Err(ConfigError::Validation(format!(
                            "Unknown option {:?}",
                            key.as_str().unwrap_or("<non-string key>")
                        )));
                    }
                    merged.insert(key, value);
                }
                serde_yaml::from_value(serde_yaml::Value::Mapping(merged))?
            }
        };

        options.validate()?;
        Ok(options)
    }

    /// Export as YAML (preset `custom` with every field overridden)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let overrides = match serde_yaml::to_value(self)? {
            serde_yaml::Value::Mapping(mapping) => Some(mapping),
            _ => None,
        };
        let file = SmgConfigFileV1 {
            version: Some(1),
            preset: Preset::Custom.to_string(),
            overrides,
        };
        serde_yaml::to_string(&file).map_err(ConfigError::Yaml)
    }
}
