use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::labels::DEFAULT_CATEGORIES;
use crate::session::DEFAULT_APP_NAME;

/// Everything a pipeline run can be configured with.
/// Missing fields in a config file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig
{
    pub app_name: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub file_extension: String,
    pub recursive: bool,
    pub categories: Vec<String>,
    /// [train, test]
    pub split_weights: Vec<f64>,
    pub split_seed: u64,
    pub max_iter: usize,
    pub reg_param: f64,
    /// 0 uses one worker per logical core.
    pub num_threads: usize,
    pub overwrite_model: bool,
}

impl Default for PipelineConfig
{
    fn default() -> Self
    {
        PipelineConfig
        {
            app_name: DEFAULT_APP_NAME.to_string(),
            input_path: PathBuf::from("data/images/test"),
            output_path: PathBuf::from("models/pneumonia_classifier"),
            file_extension: "jpeg".to_string(),
            recursive: true,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            split_weights: vec![0.7, 0.3],
            split_seed: 12345,
            max_iter: 10,
            reg_param: 0.01,
            num_threads: 0,
            overwrite_model: true,
        }
    }
}

impl PipelineConfig
{
    pub fn from_json_file(path: &Path) -> Result<PipelineConfig>
    {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn validate(&self) -> Result<()>
    {
        if self.split_weights.len() != 2 {
            return Err(Error::InvalidConfig(format!(
                "split_weights needs a train and a test weight, got {:?}", self.split_weights)));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be at least 1".to_string()));
        }
        if !self.reg_param.is_finite() || self.reg_param < 0.0 {
            return Err(Error::InvalidConfig(format!("reg_param must be finite and non-negative, got {}", self.reg_param)));
        }
        if self.categories.is_empty() {
            return Err(Error::InvalidConfig("at least one category is required".to_string()));
        }
        if self.file_extension.is_empty() {
            return Err(Error::InvalidConfig("file_extension must not be empty".to_string()));
        }
        Ok(())
    }
}
