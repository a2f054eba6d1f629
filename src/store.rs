//! Saving and loading fitted models.
//!
//! A saved model is a directory:
//!
//! ```text
//! <dir>/metadata.json    human readable description and hyper-parameters
//! <dir>/data/model.bin   bincode-encoded coefficients and intercepts
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::classifier::{Family, LogisticRegression, LogisticRegressionModel, TrainingSummary};
use crate::error::{Error, Result};
use crate::junk_drawer;

pub const MODEL_CLASS: &str = "LogisticRegressionModel";
pub const FORMAT_VERSION: u32 = 1;
const METADATA_FILE: &str = "metadata.json";
const DATA_DIR: &str = "data";
const DATA_FILE: &str = "model.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata
{
    pub class: String,
    pub format_version: u32,
    pub family: Family,
    pub num_classes: usize,
    pub num_features: usize,
    pub labels: Vec<String>,
    pub params: LogisticRegression,
    pub summary: TrainingSummary,
    pub saved_at: String,
}

// Serialized with bincode. Arrays are flattened to Vecs, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelData
{
    rows: usize,
    cols: usize,
    coefficients: Vec<f64>,
    intercepts: Vec<f64>,
}

/// Writes `model` to `dir`.
/// An existing `dir` is replaced when `overwrite` is set and is an error otherwise.
pub fn save_model(model: &LogisticRegressionModel, dir: &Path, overwrite: bool) -> Result<()>
{
    if dir.exists() {
        if !overwrite {
            return Err(Error::ModelPathExists(dir.to_path_buf()));
        }
        warn!("Overwriting existing model at {:?}", dir);
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
        } else {
            fs::remove_file(dir)?;
        }
    }
    fs::create_dir_all(dir.join(DATA_DIR))?;

    let metadata = ModelMetadata
    {
        class: MODEL_CLASS.to_string(),
        format_version: FORMAT_VERSION,
        family: model.family,
        num_classes: model.num_classes,
        num_features: model.num_features(),
        labels: model.labels.clone(),
        params: model.params.clone(),
        summary: model.summary.clone(),
        saved_at: junk_drawer::system_time_to_string(SystemTime::now()),
    };
    fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)?;

    let data = ModelData
    {
        rows: model.coefficients.nrows(),
        cols: model.coefficients.ncols(),
        coefficients: model.coefficients.iter().copied().collect(),
        intercepts: model.intercepts.to_vec(),
    };
    fs::write(dir.join(DATA_DIR).join(DATA_FILE), bincode::serialize(&data)?)?;

    info!("Saved {:?} model with {} features to {:?}", model.family, metadata.num_features, dir);
    Ok(())
}

pub fn load_metadata(dir: &Path) -> Result<ModelMetadata>
{
    let metadata: ModelMetadata = serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE))?)?;
    if metadata.class != MODEL_CLASS || metadata.format_version != FORMAT_VERSION {
        return Err(corrupt(dir, format!("unsupported model {} version {}", metadata.class, metadata.format_version)));
    }
    Ok(metadata)
}

pub fn load_model(dir: &Path) -> Result<LogisticRegressionModel>
{
    let metadata = load_metadata(dir)?;
    let data: ModelData = bincode::deserialize(&fs::read(dir.join(DATA_DIR).join(DATA_FILE))?)?;

    let expected_rows = match metadata.family {
        Family::Binomial => 1,
        Family::Multinomial => metadata.num_classes,
    };
    if data.rows != expected_rows || data.cols != metadata.num_features || data.intercepts.len() != expected_rows {
        return Err(corrupt(dir, format!(
            "expected {} x {} coefficients and {} intercepts, found {} x {} and {}",
            expected_rows, metadata.num_features, expected_rows, data.rows, data.cols, data.intercepts.len())));
    }

    let coefficients = Array2::from_shape_vec((data.rows, data.cols), data.coefficients)
        .map_err(|e| corrupt(dir, e.to_string()))?;

    Ok(LogisticRegressionModel
    {
        family: metadata.family,
        num_classes: metadata.num_classes,
        coefficients,
        intercepts: Array1::from_vec(data.intercepts),
        labels: metadata.labels,
        params: metadata.params,
        summary: metadata.summary,
    })
}

fn corrupt(dir: &Path, reason: String) -> Error
{
    Error::CorruptModel { path: PathBuf::from(dir), reason }
}
