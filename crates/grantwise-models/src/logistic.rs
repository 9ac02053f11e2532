//! L2-regularized logistic regression over one-hot indicators.
//!
//! Minimizes `½‖w‖² + C·Σ log(1 + exp(−yᵢ·w·xᵢ))` with truncated Newton
//! steps: each step solves `H·s = −∇` approximately by conjugate gradient
//! using Hessian-vector products, then backtracks along `s` until the
//! Armijo condition holds. The intercept is an extra always-active column
//! and is regularized with the rest of `w`.

use grantwise_features::{OneHotMatrix, Rows};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::ModelError;
use crate::estimator::{Estimator, FeatureImportance, Model, check_training_set, sigmoid};

const MAX_CG_ITERATIONS: usize = 250;
const CG_TOLERANCE: f64 = 0.1;
const MAX_LINE_SEARCH_STEPS: usize = 30;
const ARMIJO: f64 = 1e-4;

/// Configuration for logistic regression.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `c`             | 1.0     |
/// | `max_iter`      | 1000    |
/// | `tol`           | 1e-4    |
/// | `fit_intercept` | `true`  |
#[derive(Debug, Clone)]
pub struct LogisticRegressionConfig {
    c: f64,
    max_iter: usize,
    tol: f64,
    fit_intercept: bool,
}

impl LogisticRegressionConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            fit_intercept: true,
        }
    }

    /// Set the inverse regularization strength.
    #[must_use]
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set the maximum number of Newton steps.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the relative gradient-norm tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fit an intercept as an extra always-active column.
    #[must_use]
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Return the inverse regularization strength.
    #[must_use]
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Return the maximum number of Newton steps.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Return the relative gradient-norm tolerance.
    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Return whether an intercept is fitted.
    #[must_use]
    pub fn fit_intercept(&self) -> bool {
        self.fit_intercept
    }

    fn validate(&self) -> Result<(), ModelError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "C",
                requirement: "finite and > 0",
                value: self.c,
            });
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "tol",
                requirement: "finite and > 0",
                value: self.tol,
            });
        }
        if self.max_iter == 0 {
            return Err(ModelError::InvalidParameter {
                name: "max_iter",
                requirement: ">= 1",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Fit the model on one-hot encoded rows.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::InvalidParameter`] | `C` or `tol` is not a positive finite value, or `max_iter` is 0 |
    /// | [`ModelError::EmptyDataset`] | `x` has zero rows |
    /// | [`ModelError::ZeroFeatures`] | `x` has zero columns |
    /// | [`ModelError::LabelCountMismatch`] | `labels.len() != x.n_rows()` |
    /// | [`ModelError::SingleClass`] | every label is the same |
    #[instrument(skip_all, fields(n_rows = x.n_rows(), n_features = x.n_columns(), c = self.c))]
    pub fn fit(&self, x: &OneHotMatrix, labels: &[bool]) -> Result<LogisticRegression, ModelError> {
        self.validate()?;
        check_training_set(x.n_rows(), labels)?;
        if x.n_columns() == 0 {
            return Err(ModelError::ZeroFeatures);
        }

        let problem = Problem {
            x,
            y: labels.iter().map(|&l| if l { 1.0 } else { -1.0 }).collect(),
            c: self.c,
            fit_intercept: self.fit_intercept,
        };
        let mut w = vec![0.0; problem.dim()];

        let mut margins = problem.margins(&w);
        let mut loss = problem.loss(&w, &margins);
        let mut grad = problem.gradient(&w, &margins);
        let grad0_norm = norm(&grad);
        let mut n_iter = 0usize;

        while n_iter < self.max_iter && norm(&grad) > self.tol * grad0_norm {
            n_iter += 1;
            let curvature = problem.curvature(&margins);
            let step = problem.conjugate_gradient(&grad, &curvature);
            let slope = dot(&grad, &step);

            let mut alpha = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let candidate: Vec<f64> =
                    w.iter().zip(&step).map(|(wi, si)| wi + alpha * si).collect();
                let candidate_margins = problem.margins(&candidate);
                let candidate_loss = problem.loss(&candidate, &candidate_margins);
                if candidate_loss <= loss + ARMIJO * alpha * slope {
                    w = candidate;
                    margins = candidate_margins;
                    loss = candidate_loss;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }
            if !accepted {
                debug!(n_iter, "line search made no progress");
                break;
            }
            grad = problem.gradient(&w, &margins);
            debug!(n_iter, loss, grad_norm = norm(&grad), alpha, "newton step");
        }

        info!(n_iter, loss, "logistic regression fitted");

        let intercept = if self.fit_intercept {
            w.pop().unwrap_or(0.0)
        } else {
            0.0
        };
        Ok(LogisticRegression {
            coefficients: w,
            intercept,
            n_iter,
        })
    }
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator<OneHotMatrix> for LogisticRegressionConfig {
    type Model = LogisticRegression;

    fn fit(&self, x: &OneHotMatrix, labels: &[bool]) -> Result<LogisticRegression, ModelError> {
        LogisticRegressionConfig::fit(self, x, labels)
    }
}

/// The regularized objective over a fixed training set.
struct Problem<'a> {
    x: &'a OneHotMatrix,
    y: Vec<f64>,
    c: f64,
    fit_intercept: bool,
}

impl Problem<'_> {
    fn dim(&self) -> usize {
        self.x.n_columns() + usize::from(self.fit_intercept)
    }

    /// Compute `X·v` for every row.
    fn product(&self, v: &[f64]) -> Vec<f64> {
        let bias = if self.fit_intercept {
            v[self.x.n_columns()]
        } else {
            0.0
        };
        self.x
            .rows()
            .par_iter()
            .map(|row| bias + row.iter().map(|&j| v[j]).sum::<f64>())
            .collect()
    }

    /// Compute `Xᵀ·u`.
    fn transpose_product(&self, u: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        let bias_col = self.x.n_columns();
        for (row, &ui) in self.x.rows().iter().zip(u) {
            for &j in row {
                out[j] += ui;
            }
            if self.fit_intercept {
                out[bias_col] += ui;
            }
        }
        out
    }

    fn margins(&self, w: &[f64]) -> Vec<f64> {
        self.product(w)
    }

    fn loss(&self, w: &[f64], margins: &[f64]) -> f64 {
        let data: f64 = margins
            .iter()
            .zip(&self.y)
            .map(|(&z, &y)| log_one_plus_exp(-y * z))
            .sum();
        0.5 * dot(w, w) + self.c * data
    }

    fn gradient(&self, w: &[f64], margins: &[f64]) -> Vec<f64> {
        let residual: Vec<f64> = margins
            .iter()
            .zip(&self.y)
            .map(|(&z, &y)| self.c * (sigmoid(y * z) - 1.0) * y)
            .collect();
        let mut g = self.transpose_product(&residual);
        for (gi, wi) in g.iter_mut().zip(w) {
            *gi += wi;
        }
        g
    }

    /// Per-row Hessian weights `C·σ(z)(1−σ(z))`.
    fn curvature(&self, margins: &[f64]) -> Vec<f64> {
        margins
            .iter()
            .map(|&z| {
                let p = sigmoid(z);
                self.c * p * (1.0 - p)
            })
            .collect()
    }

    fn hessian_product(&self, curvature: &[f64], v: &[f64]) -> Vec<f64> {
        let xv = self.product(v);
        let weighted: Vec<f64> = xv.iter().zip(curvature).map(|(a, d)| a * d).collect();
        let mut out = self.transpose_product(&weighted);
        for (oi, vi) in out.iter_mut().zip(v) {
            *oi += vi;
        }
        out
    }

    /// Approximately solve `H·s = −g`.
    fn conjugate_gradient(&self, grad: &[f64], curvature: &[f64]) -> Vec<f64> {
        let mut s = vec![0.0; grad.len()];
        let mut r: Vec<f64> = grad.iter().map(|g| -g).collect();
        let mut d = r.clone();
        let mut rr = dot(&r, &r);
        let stop = CG_TOLERANCE * norm(grad);

        for _ in 0..MAX_CG_ITERATIONS {
            if rr.sqrt() <= stop {
                break;
            }
            let hd = self.hessian_product(curvature, &d);
            let alpha = rr / dot(&d, &hd);
            for i in 0..s.len() {
                s[i] += alpha * d[i];
                r[i] -= alpha * hd[i];
            }
            let rr_next = dot(&r, &r);
            let beta = rr_next / rr;
            rr = rr_next;
            for (di, ri) in d.iter_mut().zip(&r) {
                *di = ri + beta * *di;
            }
        }
        s
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// `ln(1 + e^t)` without overflow.
fn log_one_plus_exp(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

/// A fitted logistic regression model.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: Vec<f64>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegression {
    /// Return one coefficient per one-hot column.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Return the fitted intercept (0.0 when not fitted).
    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Return the number of Newton steps taken.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Model<OneHotMatrix> for LogisticRegression {
    fn predict_proba(&self, x: &OneHotMatrix) -> Result<Vec<f64>, ModelError> {
        if x.n_columns() != self.coefficients.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.coefficients.len(),
                got: x.n_columns(),
            });
        }
        Ok(x.rows()
            .par_iter()
            .map(|row| {
                let z = self.intercept + row.iter().map(|&j| self.coefficients[j]).sum::<f64>();
                sigmoid(z)
            })
            .collect())
    }
}

impl FeatureImportance for LogisticRegression {
    fn feature_importances(&self) -> Vec<f64> {
        self.coefficients.clone()
    }
}
