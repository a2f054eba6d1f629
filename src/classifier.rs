//! Logistic regression trained with full-batch gradient descent.
//!
//! Two classes use the binomial family (one coefficient row, sigmoid link);
//! more than two use the multinomial family (one row per class, softmax link).
//! Optimisation happens on centered and scaled features; the fitted
//! coefficients are mapped back so the model scores raw feature vectors.

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Example;
use crate::session::Session;

/// Probability above which the binomial family predicts class 1.
pub const BINOMIAL_THRESHOLD: f64 = 0.5;

// Armijo sufficient decrease constant.
const ARMIJO_C: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 40;
const INITIAL_STEP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family
{
    Binomial,
    Multinomial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression
{
    pub max_iter: usize,
    /// L2 regularization strength, applied to the coefficients in the standardized space.
    pub reg_param: f64,
    /// Stop when the relative change of the objective falls below this.
    pub tol: f64,
    pub fit_intercept: bool,
    pub standardization: bool,
}

impl Default for LogisticRegression
{
    fn default() -> Self
    {
        Self
        {
            max_iter: 100,
            reg_param: 0.0,
            tol: 1e-6,
            fit_intercept: true,
            standardization: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary
{
    /// Objective value before the first iteration and after each accepted step.
    pub objective_history: Vec<f64>,
    pub total_iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegressionModel
{
    pub family: Family,
    pub num_classes: usize,
    /// 1 x num_features for the binomial family, num_classes x num_features otherwise.
    pub coefficients: Array2<f64>,
    pub intercepts: Array1<f64>,
    /// Class names, position i naming class i. May be empty.
    pub labels: Vec<String>,
    pub params: LogisticRegression,
    pub summary: TrainingSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction
{
    pub id: Uuid,
    pub path: String,
    pub label: usize,
    pub prediction: usize,
    pub probability: Array1<f64>,
}

#[derive(Debug, Clone)]
struct Params
{
    weights: Array2<f64>,
    intercepts: Array1<f64>,
}

impl Params
{
    fn dot(&self, other: &Params) -> f64
    {
        (&self.weights * &other.weights).sum() + self.intercepts.dot(&other.intercepts)
    }

    fn step(&self, step: f64, direction: &Params) -> Params
    {
        let mut next = self.clone();
        next.weights.scaled_add(-step, &direction.weights);
        next.intercepts.scaled_add(-step, &direction.intercepts);
        next
    }
}

struct Objective<'a>
{
    x: ArrayView2<'a, f64>,
    labels: &'a [usize],
    family: Family,
    reg_param: f64,
    fit_intercept: bool,
}

fn sigmoid(margin: f64) -> f64
{
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}

// ln(1 + e^m) without overflow.
fn softplus(margin: f64) -> f64
{
    if margin > 0.0 {
        margin + (-margin).exp().ln_1p()
    } else {
        margin.exp().ln_1p()
    }
}

fn softmax(margins: ArrayView1<f64>) -> Array1<f64>
{
    let max = margins.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = margins.mapv(|m| (m - max).exp());
    let sum = exp.sum();
    exp / sum
}

impl Objective<'_>
{
    /// Mean log-loss plus the L2 penalty, and its gradient.
    fn evaluate(&self, params: &Params) -> (f64, Params)
    {
        match self.family {
            Family::Binomial => self.binomial(params),
            Family::Multinomial => self.multinomial(params),
        }
    }

    fn binomial(&self, params: &Params) -> (f64, Params)
    {
        let n = self.labels.len() as f64;
        let w = params.weights.row(0);
        let margins = self.x.dot(&w) + params.intercepts[0];

        let mut loss = 0.0;
        let mut multipliers = Array1::<f64>::zeros(self.labels.len());
        for ((margin, &label), multiplier) in margins.iter().zip(self.labels).zip(multipliers.iter_mut()) {
            let y = label as f64;
            loss += softplus(*margin) - y * margin;
            *multiplier = (sigmoid(*margin) - y) / n;
        }

        let mut grad_w = self.x.t().dot(&multipliers);
        grad_w.scaled_add(self.reg_param, &w);
        let loss = loss / n + 0.5 * self.reg_param * w.dot(&w);
        let grad_b = if self.fit_intercept { multipliers.sum() } else { 0.0 };

        (loss, Params { weights: grad_w.insert_axis(Axis(0)), intercepts: Array1::from_elem(1, grad_b) })
    }

    fn multinomial(&self, params: &Params) -> (f64, Params)
    {
        let n = self.labels.len() as f64;
        let num_classes = params.intercepts.len();
        let margins = self.x.dot(&params.weights.t()) + &params.intercepts;

        let mut loss = 0.0;
        let mut multipliers = Array2::<f64>::zeros((self.labels.len(), num_classes));
        for ((row, &label), mut multiplier_row) in margins.rows().into_iter().zip(self.labels).zip(multipliers.rows_mut()) {
            let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            let log_sum_exp = max + row.iter().map(|m| (m - max).exp()).sum::<f64>().ln();
            loss += log_sum_exp - row[label];
            for (class, (margin, multiplier)) in row.iter().zip(multiplier_row.iter_mut()).enumerate() {
                let indicator = if class == label { 1.0 } else { 0.0 };
                *multiplier = ((margin - log_sum_exp).exp() - indicator) / n;
            }
        }

        let mut grad_w = multipliers.t().dot(&self.x);
        grad_w.scaled_add(self.reg_param, &params.weights);
        let loss = loss / n + 0.5 * self.reg_param * params.weights.iter().map(|w| w * w).sum::<f64>();
        let grad_b = if self.fit_intercept {
            multipliers.sum_axis(Axis(0))
        } else {
            Array1::zeros(num_classes)
        };

        (loss, Params { weights: grad_w, intercepts: grad_b })
    }
}

/// Gradient descent with a backtracking line search.
/// The step that was accepted last is doubled as the first guess of the next iteration.
fn minimize(objective: &Objective, initial: Params, max_iter: usize, tol: f64) -> (Params, TrainingSummary)
{
    let mut params = initial;
    let (mut loss, mut grad) = objective.evaluate(&params);
    let mut summary = TrainingSummary { objective_history: vec![loss], ..Default::default() };
    let mut step = INITIAL_STEP;

    for iteration in 0..max_iter {
        let grad_norm_sq = grad.dot(&grad);
        if grad_norm_sq == 0.0 {
            summary.converged = true;
            break;
        }

        let mut accepted = None;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let candidate = params.step(step, &grad);
            let (candidate_loss, candidate_grad) = objective.evaluate(&candidate);
            if candidate_loss.is_finite() && candidate_loss <= loss - ARMIJO_C * step * grad_norm_sq {
                accepted = Some((candidate, candidate_loss, candidate_grad));
                break;
            }
            step *= 0.5;
        }

        let Some((candidate, candidate_loss, candidate_grad)) = accepted else {
            warn!("Line search failed to decrease the objective at iteration {}", iteration + 1);
            break;
        };

        let relative_change = (loss - candidate_loss).abs() / loss.abs().max(f64::MIN_POSITIVE);
        params = candidate;
        loss = candidate_loss;
        grad = candidate_grad;
        summary.objective_history.push(loss);
        summary.total_iterations = iteration + 1;
        debug!("Iteration {}: objective {:.6} (step {:e})", iteration + 1, loss, step);

        if relative_change < tol {
            summary.converged = true;
            break;
        }
        step *= 2.0;
    }

    (params, summary)
}

fn feature_matrix(examples: &[Example]) -> Result<Array2<f64>>
{
    let num_features = examples.first().map(|e| e.features.len()).ok_or(Error::EmptyDataset("training"))?;
    let mut x = Array2::<f64>::zeros((examples.len(), num_features));
    for (mut row, example) in x.rows_mut().into_iter().zip(examples) {
        if example.features.len() != num_features {
            return Err(Error::DimensionMismatch { expected: num_features, found: example.features.len() });
        }
        row.assign(&example.features);
    }
    Ok(x)
}

impl LogisticRegression
{
    pub fn new(max_iter: usize, reg_param: f64) -> Self
    {
        Self { max_iter, reg_param, ..Default::default() }
    }

    /// Fits a model to `examples`. `labels` names the classes (index i names class i);
    /// the number of classes is the larger of `labels.len()` and the largest label seen plus one.
    pub fn fit(&self, examples: &[Example], labels: &[String]) -> Result<LogisticRegressionModel>
    {
        let mut x = feature_matrix(examples)?;
        let (n, num_features) = x.dim();
        let y: Vec<usize> = examples.iter().map(|e| e.label).collect();

        let max_label = y.iter().copied().max().unwrap_or(0);
        let num_classes = labels.len().max(max_label + 1).max(2);
        let family = if num_classes <= 2 { Family::Binomial } else { Family::Multinomial };
        let mut class_counts = vec![0usize; num_classes];
        for &label in &y {
            class_counts[label] += 1;
        }
        info!("Training {:?} logistic regression on {} examples with {} features and {} classes", family, n, num_features, num_classes);
        debug!("Class counts: {:?}", class_counts);

        if family == Family::Binomial && self.fit_intercept && class_counts.iter().any(|&c| c == 0) {
            return Ok(self.constant_model(num_features, &class_counts, labels));
        }

        // Column statistics. The mean is only removed when an intercept can absorb it.
        let mean = if self.fit_intercept {
            x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(num_features))
        } else {
            Array1::zeros(num_features)
        };
        let std = if n > 1 { x.std_axis(Axis(0), 1.0) } else { Array1::zeros(num_features) };
        // Constant columns get a zero coefficient.
        let inv_scale = std.mapv(|s| {
            if s > 0.0 {
                if self.standardization { 1.0 / s } else { 1.0 }
            } else {
                0.0
            }
        });
        x -= &mean;
        x *= &inv_scale;

        let rows = if family == Family::Binomial { 1 } else { num_classes };
        let initial = Params
        {
            weights: Array2::zeros((rows, num_features)),
            intercepts: self.initial_intercepts(family, &class_counts),
        };
        let objective = Objective
        {
            x: x.view(),
            labels: &y,
            family,
            reg_param: self.reg_param,
            fit_intercept: self.fit_intercept,
        };

        let now = std::time::Instant::now();
        let (fitted, summary) = minimize(&objective, initial, self.max_iter, self.tol);
        info!("Optimisation took {:?} over {} iterations (converged: {})", now.elapsed(), summary.total_iterations, summary.converged);

        // Back to the raw feature space: w = w' / s and b = b' - w . mean.
        let coefficients = &fitted.weights * &inv_scale;
        let intercepts = &fitted.intercepts - &coefficients.dot(&mean);

        Ok(LogisticRegressionModel
        {
            family,
            num_classes,
            coefficients,
            intercepts,
            labels: labels.to_vec(),
            params: self.clone(),
            summary,
        })
    }

    fn initial_intercepts(&self, family: Family, class_counts: &[usize]) -> Array1<f64>
    {
        if !self.fit_intercept {
            let len = if family == Family::Binomial { 1 } else { class_counts.len() };
            return Array1::zeros(len);
        }
        match family {
            Family::Binomial => Array1::from_elem(1, (class_counts[1] as f64 / class_counts[0] as f64).ln()),
            Family::Multinomial => {
                if class_counts.iter().any(|&c| c == 0) {
                    return Array1::zeros(class_counts.len());
                }
                let log_counts = class_counts.iter().map(|&c| (c as f64).ln()).collect::<Array1<f64>>();
                let mean = log_counts.mean().unwrap_or(0.0);
                log_counts - mean
            }
        }
    }

    /// Only one class is present in the training data, so every example gets that class.
    fn constant_model(&self, num_features: usize, class_counts: &[usize], labels: &[String]) -> LogisticRegressionModel
    {
        let intercept = if class_counts[1] == 0 { f64::NEG_INFINITY } else { f64::INFINITY };
        warn!("All training examples have the same label; the model will always predict class {}", if intercept > 0.0 { 1 } else { 0 });
        LogisticRegressionModel
        {
            family: Family::Binomial,
            num_classes: 2,
            coefficients: Array2::zeros((1, num_features)),
            intercepts: Array1::from_elem(1, intercept),
            labels: labels.to_vec(),
            params: self.clone(),
            summary: TrainingSummary { converged: true, ..Default::default() },
        }
    }
}

impl LogisticRegressionModel
{
    pub fn num_features(&self) -> usize
    {
        self.coefficients.ncols()
    }

    fn margins(&self, features: ArrayView1<f64>) -> Result<Array1<f64>>
    {
        if features.len() != self.num_features() {
            return Err(Error::DimensionMismatch { expected: self.num_features(), found: features.len() });
        }
        Ok(self.coefficients.dot(&features) + &self.intercepts)
    }

    /// Class probabilities, position i being the probability of class i.
    pub fn predict_probabilities(&self, features: ArrayView1<f64>) -> Result<Array1<f64>>
    {
        let margins = self.margins(features)?;
        Ok(match self.family {
            Family::Binomial => {
                let p = sigmoid(margins[0]);
                Array1::from_vec(vec![1.0 - p, p])
            },
            Family::Multinomial => softmax(margins.view()),
        })
    }

    pub fn predict(&self, features: ArrayView1<f64>) -> Result<usize>
    {
        let probabilities = self.predict_probabilities(features)?;
        Ok(self.class_of(&probabilities))
    }

    fn class_of(&self, probabilities: &Array1<f64>) -> usize
    {
        match self.family {
            Family::Binomial => if probabilities[1] > BINOMIAL_THRESHOLD { 1 } else { 0 },
            Family::Multinomial => {
                let mut best = 0;
                for (class, p) in probabilities.iter().enumerate() {
                    if *p > probabilities[best] {
                        best = class;
                    }
                }
                best
            }
        }
    }

    pub fn label_of(&self, class: usize) -> Option<&str>
    {
        self.labels.get(class).map(|l| l.as_str())
    }

    /// Scores every example on the session's pool. Output order matches input order.
    pub fn transform(&self, session: &Session, examples: &[Example]) -> Result<Vec<Prediction>>
    {
        session.install(|| {
            examples.par_iter().map(|example| -> Result<Prediction> {
                let probability = self.predict_probabilities(example.features.view())?;
                Ok(Prediction
                {
                    id: example.id,
                    path: example.path.clone(),
                    label: example.label,
                    prediction: self.class_of(&probability),
                    probability,
                })
            }).collect()
        })
    }
}

#[cfg(test)]
mod tests
{
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    fn example(label: usize, features: Vec<f64>) -> Example
    {
        Example { id: Uuid::new_v4(), path: format!("/x/{}.jpeg", label), label, features: Array1::from_vec(features) }
    }

    fn names(labels: &[&str]) -> Vec<String>
    {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn sigmoid_and_softplus_are_stable()
    {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(sigmoid(1000.0), 1.0);
        assert_abs_diff_eq!(sigmoid(-1000.0), 0.0);
        assert_abs_diff_eq!(softplus(0.0), 2f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(softplus(1000.0), 1000.0);
        assert!(softplus(-1000.0) >= 0.0);
    }

    #[test]
    fn binomial_separates_one_dimensional_data()
    {
        // The second feature is constant and must end up with a zero coefficient.
        let examples = vec![
            example(0, vec![0.05, 0.5]),
            example(0, vec![0.15, 0.5]),
            example(0, vec![0.25, 0.5]),
            example(0, vec![0.35, 0.5]),
            example(1, vec![0.65, 0.5]),
            example(1, vec![0.75, 0.5]),
            example(1, vec![0.85, 0.5]),
            example(1, vec![0.95, 0.5]),
        ];
        let model = LogisticRegression::new(100, 0.0).fit(&examples, &names(&["NORMAL", "PNEUMONIA"])).unwrap();

        assert_eq!(model.family, Family::Binomial);
        assert_eq!(model.num_classes, 2);
        assert_eq!(model.coefficients.dim(), (1, 2));
        assert_eq!(model.coefficients[[0, 1]], 0.0);
        assert!(model.coefficients[[0, 0]] > 0.0);
        for e in &examples {
            assert_eq!(model.predict(e.features.view()).unwrap(), e.label);
        }
        assert_eq!(model.label_of(1), Some("PNEUMONIA"));
    }

    #[test]
    fn objective_decreases_monotonically()
    {
        let examples = vec![
            example(0, vec![0.0, 1.0]),
            example(0, vec![0.2, 0.7]),
            example(1, vec![0.9, 0.1]),
            example(1, vec![0.6, 0.3]),
            example(0, vec![0.5, 0.6]),
        ];
        let model = LogisticRegression::new(20, 0.01).fit(&examples, &names(&["a", "b"])).unwrap();
        let history = &model.summary.objective_history;
        assert!(history.len() >= 2);
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert!(model.summary.total_iterations <= 20);
    }

    #[test]
    fn white_and_black_images_are_separable()
    {
        let white = vec![1.0; 64];
        let black = vec![0.0; 64];
        let mut examples = Vec::new();
        for i in 0..7 {
            examples.push(example(i % 2, if i % 2 == 0 { white.clone() } else { black.clone() }));
        }
        let model = LogisticRegression::new(10, 0.01).fit(&examples, &names(&["NORMAL", "PNEUMONIA"])).unwrap();
        assert_eq!(model.predict(Array1::from_vec(white).view()).unwrap(), 0);
        assert_eq!(model.predict(Array1::from_vec(black).view()).unwrap(), 1);
    }

    #[test]
    fn multinomial_for_three_classes()
    {
        let mut examples = Vec::new();
        for i in 0..5 {
            let jitter = i as f64 * 0.02;
            examples.push(example(0, vec![0.0 + jitter, 0.0 + jitter]));
            examples.push(example(1, vec![1.0 - jitter, 0.0 + jitter]));
            examples.push(example(2, vec![0.0 + jitter, 1.0 - jitter]));
        }
        let model = LogisticRegression::new(200, 0.0).fit(&examples, &names(&["a", "b", "c"])).unwrap();

        assert_eq!(model.family, Family::Multinomial);
        assert_eq!(model.coefficients.dim(), (3, 2));
        for e in &examples {
            assert_eq!(model.predict(e.features.view()).unwrap(), e.label);
            let p = model.predict_probabilities(e.features.view()).unwrap();
            assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn single_class_predicts_that_class()
    {
        let examples = vec![example(1, vec![0.3, 0.1]), example(1, vec![0.9, 0.2])];
        let model = LogisticRegression::new(10, 0.01).fit(&examples, &names(&["NORMAL", "PNEUMONIA"])).unwrap();
        assert_eq!(model.predict(array![0.0, 0.0].view()).unwrap(), 1);
        assert_eq!(model.summary.total_iterations, 0);
    }

    #[test]
    fn empty_training_set_is_rejected()
    {
        let result = LogisticRegression::default().fit(&[], &names(&["a", "b"]));
        assert!(matches!(result, Err(Error::EmptyDataset(_))));
    }

    #[test]
    fn mismatched_feature_lengths_are_rejected()
    {
        let examples = vec![example(0, vec![0.1, 0.2]), example(1, vec![0.3])];
        let result = LogisticRegression::default().fit(&examples, &names(&["a", "b"]));
        assert!(matches!(result, Err(Error::DimensionMismatch { expected: 2, found: 1 })));
    }

    #[test]
    fn prediction_checks_feature_length()
    {
        let examples = vec![example(0, vec![0.1, 0.2]), example(1, vec![0.9, 0.8])];
        let model = LogisticRegression::default().fit(&examples, &names(&["a", "b"])).unwrap();
        assert!(matches!(model.predict(array![0.1].view()), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn transform_keeps_order_and_labels()
    {
        let session = Session::builder().num_threads(2).build().unwrap();
        let examples = vec![
            example(0, vec![0.0]),
            example(1, vec![1.0]),
            example(0, vec![0.1]),
            example(1, vec![0.9]),
        ];
        let model = LogisticRegression::new(50, 0.0).fit(&examples, &names(&["a", "b"])).unwrap();
        let predictions = model.transform(&session, &examples).unwrap();
        assert_eq!(predictions.len(), 4);
        for (prediction, example) in predictions.iter().zip(&examples) {
            assert_eq!(prediction.id, example.id);
            assert_eq!(prediction.label, example.label);
            assert_eq!(prediction.prediction, example.label);
            assert_eq!(prediction.probability.len(), 2);
        }
    }
}
