// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vizconv_shared::{AnalyzerType, ScaleType};

use crate::converter::{ConverterError, SourceConverter};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub converter: OverrideConfig,
    pub demo: DemoConfig,
}

/// Overrides applied to a fresh converter. Unset values inherit from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    pub frequency_count: Option<u32>,
    pub channel_count: Option<u32>,
    pub rise_ms: Option<u64>,
    pub fall_ms: Option<u64>,
    pub min_frequency: Option<f32>,
    pub max_frequency: Option<f32>,
    pub frequency_scale: Option<ScaleType>,
    pub analyzer_types: Option<AnalyzerType>,
    pub cache_data: bool,
    pub channel_mapping: Option<Vec<f32>>,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            frequency_count: None,
            channel_count: None,
            rise_ms: None,
            fall_ms: None,
            min_frequency: None,
            max_frequency: None,
            frequency_scale: None,
            analyzer_types: None,
            cache_data: true,
            channel_mapping: None,
        }
    }
}

/// Native parameters of the synthetic source driven by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub channels: u32,
    pub frequency_count: u32,
    pub frequency_scale: ScaleType,
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub fps: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            frequency_count: 1024,
            frequency_scale: ScaleType::Linear,
            min_frequency: 0.0,
            max_frequency: 22_050.0,
            fps: 60.0,
        }
    }
}

impl OverrideConfig {
    /// Push every value through the converter's validating setters.
    ///
    /// The frequency scale goes first and the maximum before the minimum, so
    /// a range that is valid as a whole is accepted regardless of what the
    /// source reports.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConverterError`] raised by a setter. Values applied
    /// before it stay applied.
    pub fn apply_to(&self, converter: &SourceConverter) -> Result<(), ConverterError> {
        converter.set_frequency_scale(self.frequency_scale);
        if self.max_frequency.is_some() {
            converter.set_max_frequency(self.max_frequency)?;
        }
        if self.min_frequency.is_some() {
            converter.set_min_frequency(self.min_frequency)?;
        }
        converter.set_frequency_count(self.frequency_count)?;
        converter.set_channel_count(self.channel_count)?;
        converter.set_rise_time(self.rise_ms.map(Duration::from_millis))?;
        converter.set_fall_time(self.fall_ms.map(Duration::from_millis))?;
        converter.set_analyzer_types(self.analyzer_types);
        converter.set_cache_data(self.cache_data);
        converter.set_channel_mapping(self.channel_mapping.clone())?;
        Ok(())
    }
}

impl ConverterConfig {
    /// Get the config file path
    fn get_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("vizconv")
            .join("converter.toml")
    }

    /// Load configuration from the default location
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    /// Load configuration from `path`, falling back to defaults
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ConverterConfig>(&content) {
                Ok(config) => {
                    debug!("Loaded converter config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {}: {e}. Using defaults.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                debug!(
                    "Config file {} not found or unreadable: {e}. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Save configuration to the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::get_config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Saved converter config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("vizconv_config_test_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = ConverterConfig::load_from(&temp_path("missing.toml"));
        assert_eq!(config, ConverterConfig::default());
        assert!(config.converter.cache_data);
        assert_eq!(config.demo.frequency_count, 1024);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("converter.toml");
        let mut config = ConverterConfig::default();
        config.converter.frequency_count = Some(64);
        config.converter.frequency_scale = Some(ScaleType::Logarithmic);
        config.converter.analyzer_types = Some(AnalyzerType::RMS | AnalyzerType::SPECTRUM);
        config.converter.rise_ms = Some(80);

        config.save_to(&path).unwrap();
        assert_eq!(ConverterConfig::load_from(&path), config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ConverterConfig = toml::from_str(
            r#"
            [converter]
            channel_count = 1
            frequency_scale = "logarithmic"
            "#,
        )
        .unwrap();
        assert_eq!(config.converter.channel_count, Some(1));
        assert_eq!(
            config.converter.frequency_scale,
            Some(ScaleType::Logarithmic)
        );
        assert!(config.converter.cache_data);
        assert_eq!(config.demo, DemoConfig::default());
    }

    #[test]
    fn test_unparsable_file_gives_defaults() {
        let path = temp_path("broken.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "converter = 12").unwrap();

        assert_eq!(ConverterConfig::load_from(&path), ConverterConfig::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_apply_to_converter() {
        let converter = SourceConverter::new();
        let overrides = OverrideConfig {
            frequency_count: Some(32),
            min_frequency: Some(20.0),
            max_frequency: Some(16_000.0),
            frequency_scale: Some(ScaleType::Logarithmic),
            rise_ms: Some(50),
            cache_data: false,
            ..OverrideConfig::default()
        };
        overrides.apply_to(&converter).unwrap();

        assert_eq!(converter.frequency_count(), Some(32));
        assert_eq!(converter.min_frequency(), Some(20.0));
        assert_eq!(converter.max_frequency(), Some(16_000.0));
        assert_eq!(converter.frequency_scale(), Some(ScaleType::Logarithmic));
        assert_eq!(converter.rise_time(), Some(Duration::from_millis(50)));
        assert!(!converter.cache_data());
    }

    #[test]
    fn test_apply_to_reports_first_rejection() {
        let converter = SourceConverter::new();
        let overrides = OverrideConfig {
            frequency_count: Some(0),
            ..OverrideConfig::default()
        };
        assert!(matches!(
            overrides.apply_to(&converter),
            Err(ConverterError::Validation(_))
        ));
    }
}
