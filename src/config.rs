use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result};

const SUPPORTED_FORMATS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Run configuration, passed explicitly to every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    /// Crops wider than this are resized to `max_image_size x max_image_size`.
    pub max_image_size: u32,
    /// Subset directories under `dataset_directory`, processed in order.
    pub targets: Vec<String>,
    /// Padding added around the square box, as a fraction of its width.
    pub padding_ratio: f64,
    pub canvas_size: u32,
    /// Raster extension used for diagnostic output.
    pub image_format: String,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_directory: None,
            output_directory: None,
            max_image_size: 500,
            targets: vec!["00_Test".to_string()],
            padding_ratio: 0.3,
            canvas_size: 500,
            image_format: "png".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PrepError::Config(e.to_string()))
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PrepError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn dataset_dir(&self) -> Result<&Path> {
        self.dataset_directory
            .as_deref()
            .ok_or_else(|| PrepError::Config("dataset directory is required".to_string()))
    }

    pub fn output_dir(&self) -> Result<&Path> {
        self.output_directory
            .as_deref()
            .ok_or_else(|| PrepError::Config("output directory is required".to_string()))
    }

    pub fn target_dirs(&self) -> Result<Vec<(String, PathBuf)>> {
        let root = self.dataset_dir()?;
        Ok(self
            .targets
            .iter()
            .map(|t| (t.clone(), root.join(t)))
            .collect())
    }

    /// Checks everything needed to build the corpus.
    pub fn validate_input(&self) -> Result<()> {
        self.dataset_dir()?;

        if self.max_image_size == 0 {
            return Err(PrepError::Config("max_image_size must be positive".to_string()));
        }
        if self.canvas_size == 0 {
            return Err(PrepError::Config("canvas_size must be positive".to_string()));
        }
        if !self.padding_ratio.is_finite() || self.padding_ratio < 0.0 {
            return Err(PrepError::Config(format!(
                "padding_ratio must be a non-negative number, got {}",
                self.padding_ratio
            )));
        }
        if self.targets.is_empty() {
            return Err(PrepError::Config("at least one target subset is required".to_string()));
        }
        if !SUPPORTED_FORMATS
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&self.image_format))
        {
            return Err(PrepError::Config(format!(
                "unsupported image format {:?}, expected one of {:?}",
                self.image_format, SUPPORTED_FORMATS
            )));
        }
        Ok(())
    }

    /// Checks the full run configuration, output included.
    pub fn validate(&self) -> Result<()> {
        self.validate_input()?;
        self.output_dir()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::test_config;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_image_size, 500);
        assert_eq!(config.canvas_size, 500);
        assert_eq!(config.padding_ratio, 0.3);
        assert_eq!(config.targets, vec!["00_Test"]);
    }

    #[test]
    fn test_missing_directories_are_rejected() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("dataset directory is required"));

        let config = Config {
            dataset_directory: Some(PathBuf::from("data")),
            ..Config::default()
        };
        assert!(config.validate_input().is_ok());
        assert!(config.validate().unwrap_err().to_string().contains("output directory"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.max_image_size = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.padding_ratio = -0.1;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.targets.clear();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.image_format = "tiff".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            dataset_directory = "/data/300w"
            output_directory = "out"
            targets = ["01_Indoor", "02_Outdoor"]
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset_directory, Some(PathBuf::from("/data/300w")));
        assert_eq!(config.targets, vec!["01_Indoor", "02_Outdoor"]);
        assert_eq!(config.max_image_size, 500);
        assert!(config.validate().is_ok());

        let dirs = config.target_dirs().unwrap();
        assert_eq!(dirs[1].1, PathBuf::from("/data/300w/02_Outdoor"));

        let untargeted = Config::from_toml_str("dataset_directory = \"/data/300w\"").unwrap();
        assert_eq!(untargeted.targets, vec!["00_Test"]);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml_str("max_image_size = \"big\"").unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }
}
