//! Multiclass metrics over a set of predictions.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::classifier::Prediction;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric
{
    #[default]
    Accuracy,
    WeightedPrecision,
    WeightedRecall,
    /// F1 per class, weighted by the class frequency among the true labels.
    F1,
}

/// counts[[actual, predicted]]
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix
{
    counts: Array2<usize>,
    total: usize,
}

impl ConfusionMatrix
{
    pub fn from_predictions(predictions: &[Prediction]) -> Result<ConfusionMatrix>
    {
        let num_classes = predictions
            .iter()
            .map(|p| p.label.max(p.prediction) + 1)
            .max()
            .ok_or(Error::EmptyDataset("prediction"))?;

        let mut counts = Array2::<usize>::zeros((num_classes, num_classes));
        for p in predictions {
            counts[[p.label, p.prediction]] += 1;
        }
        Ok(ConfusionMatrix { counts, total: predictions.len() })
    }

    pub fn counts(&self) -> &Array2<usize>
    {
        &self.counts
    }

    pub fn num_classes(&self) -> usize
    {
        self.counts.nrows()
    }

    pub fn accuracy(&self) -> f64
    {
        self.counts.diag().sum() as f64 / self.total as f64
    }

    fn true_positives(&self, class: usize) -> f64
    {
        self.counts[[class, class]] as f64
    }

    fn actual(&self, class: usize) -> f64
    {
        self.counts.row(class).sum() as f64
    }

    fn predicted(&self, class: usize) -> f64
    {
        self.counts.column(class).sum() as f64
    }

    pub fn precision(&self, class: usize) -> f64
    {
        let predicted = self.predicted(class);
        if predicted == 0.0 { 0.0 } else { self.true_positives(class) / predicted }
    }

    pub fn recall(&self, class: usize) -> f64
    {
        let actual = self.actual(class);
        if actual == 0.0 { 0.0 } else { self.true_positives(class) / actual }
    }

    pub fn f1(&self, class: usize) -> f64
    {
        let (p, r) = (self.precision(class), self.recall(class));
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    // Only classes that occur among the true labels carry weight.
    fn weighted(&self, per_class: impl Fn(usize) -> f64) -> f64
    {
        (0..self.num_classes())
            .map(|class| self.actual(class) / self.total as f64 * per_class(class))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MulticlassEvaluator
{
    pub metric: Metric,
}

impl MulticlassEvaluator
{
    pub fn new(metric: Metric) -> Self
    {
        Self { metric }
    }

    pub fn evaluate(&self, predictions: &[Prediction]) -> Result<f64>
    {
        let matrix = ConfusionMatrix::from_predictions(predictions)?;
        Ok(match self.metric {
            Metric::Accuracy => matrix.accuracy(),
            Metric::WeightedPrecision => matrix.weighted(|c| matrix.precision(c)),
            Metric::WeightedRecall => matrix.weighted(|c| matrix.recall(c)),
            Metric::F1 => matrix.weighted(|c| matrix.f1(c)),
        })
    }
}
