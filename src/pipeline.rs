//! The end-to-end run: load, label, index, featurize, split, train, evaluate, save.

use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info, warn};

use crate::classifier::LogisticRegression;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::evaluation::{Metric, MulticlassEvaluator};
use crate::indexer::LabelIndex;
use crate::junk_drawer::format_duration;
use crate::labels;
use crate::loader::{self, LoaderOptions};
use crate::preprocessing;
use crate::session::Session;
use crate::split;
use crate::store;

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport
{
    pub record_count: usize,
    /// Records whose path named no category. They are kept under the empty label.
    pub unlabeled_count: usize,
    /// Records that failed to decode and were given an empty feature vector.
    pub degraded_count: usize,
    pub train_count: usize,
    pub test_count: usize,
    pub labels: Vec<String>,
    pub accuracy: f64,
    pub model_path: PathBuf,
}

pub fn run(session: &Session, config: &PipelineConfig) -> Result<PipelineReport>
{
    let start = Instant::now();

    let options = LoaderOptions
    {
        root: config.input_path.clone(),
        extension: config.file_extension.clone(),
        recursive: config.recursive,
    };
    let records = loader::load_images(session, &options)?;
    let record_count = records.len();
    if record_count == 0 {
        return Err(Error::EmptyDataset("input"));
    }

    let labeled = labels::label_records(records, &config.categories);
    for sample in labeled.iter().take(SAMPLE_SIZE) {
        info!("{:?} -> {:?}", sample.record.path, sample.label_string);
    }
    let unlabeled_count = labeled.iter().filter(|r| r.label_string.is_empty()).count();
    if unlabeled_count > 0 {
        warn!("{} of {} records did not match any of {:?} and keep an empty label", unlabeled_count, record_count, config.categories);
    }

    let index = LabelIndex::fit_records(&labeled);
    for (i, label) in index.labels().iter().enumerate() {
        info!("Label {:?} -> {}", label, i);
    }
    let indexed = index.transform(labeled)?;

    let features_start = Instant::now();
    let (examples, degraded_count) = preprocessing::extract_features(session, indexed);
    info!(
        "Extracted {} feature vectors of length {} in {}",
        examples.len(),
        preprocessing::FEATURE_VECTOR_LENGTH,
        format_duration(features_start.elapsed()));
    if degraded_count > 0 {
        warn!("{} records could not be decoded and were given empty feature vectors", degraded_count);
    }

    let mut partitions = split::random_split(examples, &config.split_weights, config.split_seed)?.into_iter();
    let train = partitions.next().unwrap_or_default();
    let test = partitions.next().unwrap_or_default();
    info!("Training set: {} examples, test set: {} examples", train.len(), test.len());
    if train.is_empty() {
        return Err(Error::EmptyDataset("training"));
    }
    if test.is_empty() {
        return Err(Error::EmptyDataset("test"));
    }

    let train_start = Instant::now();
    let model = LogisticRegression::new(config.max_iter, config.reg_param).fit(&train, index.labels())?;
    info!(
        "Trained {:?} logistic regression ({} iterations) in {}",
        model.family,
        model.summary.total_iterations,
        format_duration(train_start.elapsed()));
    debug!("Objective history: {:?}", model.summary.objective_history);

    let predictions = model.transform(session, &test)?;
    for p in predictions.iter().take(SAMPLE_SIZE) {
        info!(
            "{:?}: label {} ({}), prediction {} ({}), probability {}",
            p.path,
            p.label,
            index.label_of(p.label).unwrap_or("?"),
            p.prediction,
            index.label_of(p.prediction).unwrap_or("?"),
            p.probability);
    }

    let accuracy = MulticlassEvaluator::new(Metric::Accuracy).evaluate(&predictions)?;
    info!("Test set accuracy = {}", accuracy);

    store::save_model(&model, &config.output_path, config.overwrite_model)?;

    info!("Pipeline finished in {}", format_duration(start.elapsed()));

    Ok(PipelineReport
    {
        record_count,
        unlabeled_count,
        degraded_count,
        train_count: train.len(),
        test_count: test.len(),
        labels: index.labels().to_vec(),
        accuracy,
        model_path: config.output_path.clone(),
    })
}
