//! Linear model implementations

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{
    argmax, as_column, check_features, check_samples, decode_model, encode_model,
    regression_target, ClassLayout, Hyperparameters, Model, ModelKind,
};
use crate::error::{AutoopError, Result};

/// Cholesky factorisation `A = L * L^T`.
/// Returns `None` when a pivot is not clearly positive relative to the
/// largest diagonal entry.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let max_diag = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = 1e-10 * max_diag.max(f64::MIN_POSITIVE);
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= tol {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve the symmetric positive-definite system `A x = b`.
/// Near-singular systems (collinear or one-hot columns) are retried with a
/// small ridge on the diagonal.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let l = match cholesky(a) {
        Some(l) => l,
        None => {
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            let ridge = if ridge > 0.0 { ridge } else { 1e-8 };
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky(&a_reg)?
        }
    };

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Center columns of `x` and `y`, returning the means
fn center(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
    let y_centered = y - y_mean;
    (x_centered, y_centered, x_mean, y_mean)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Multiple linear regression
// ═══════════════════════════════════════════════════════════════════════════

/// Ordinary least squares via the normal equations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleLinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    is_fitted: bool,
}

impl Default for MultipleLinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipleLinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            is_fitted: false,
        }
    }

    pub fn from_hyperparameters(params: &Hyperparameters) -> Self {
        Self::new().with_fit_intercept(params.get_bool("fit_intercept", true))
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }
}

impl Model for MultipleLinearRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::MultipleLinearRegression
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let y = regression_target(y)?;

        let (x_fit, y_fit, x_mean, y_mean) = if self.fit_intercept {
            center(x, &y)
        } else {
            (x.clone(), y.clone(), Array1::zeros(x.ncols()), 0.0)
        };

        let xtx = x_fit.t().dot(&x_fit);
        let xty = x_fit.t().dot(&y_fit);
        let coefficients = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            AutoopError::ComputationError("matrix is singular, cannot solve least squares".to_string())
        })?;

        self.intercept = Some(y_mean - coefficients.dot(&x_mean));
        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(AutoopError::ModelNotFitted),
        };
        check_features(coefficients.len(), x)?;
        Ok(as_column(x.dot(coefficients) + self.intercept.unwrap_or(0.0)))
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new().with("fit_intercept", if self.fit_intercept { 1.0 } else { 0.0 })
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Elastic net
// ═══════════════════════════════════════════════════════════════════════════

/// Elastic Net Regression (L1 + L2 regularization via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNet {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    is_fitted: bool,
}

impl Default for ElasticNet {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNet {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-6,
            is_fitted: false,
        }
    }

    pub fn from_hyperparameters(params: &Hyperparameters) -> Result<Self> {
        let alpha = params.get_or("alpha", 1.0);
        if alpha < 0.0 {
            return Err(AutoopError::InvalidInput(format!(
                "alpha must be non-negative, got {}",
                alpha
            )));
        }
        Ok(Self::new(alpha, params.get_or("l1_ratio", 0.5))
            .with_fit_intercept(params.get_bool("fit_intercept", true))
            .with_max_iter(params.get_usize("max_iter", 1000)?))
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }

    fn soft_threshold(value: f64, threshold: f64) -> f64 {
        if value > threshold {
            value - threshold
        } else if value < -threshold {
            value + threshold
        } else {
            0.0
        }
    }
}

impl Model for ElasticNet {
    fn kind(&self) -> ModelKind {
        ModelKind::ElasticNet
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let y = regression_target(y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let (x_c, y_c, x_mean, y_mean) = if self.fit_intercept {
            center(x, &y)
        } else {
            (x.clone(), y.clone(), Array1::zeros(n_features), 0.0)
        };

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::zeros(n_features);
        let n = n_samples as f64;
        let l1_penalty = self.alpha * self.l1_ratio * n;
        let l2_penalty = self.alpha * (1.0 - self.l1_ratio) * n;

        for _iter in 0..self.max_iter {
            let w_old = w.clone();
            let mut r = &y_c - &x_c.dot(&w);

            for j in 0..n_features {
                let denom = col_norms[j] + l2_penalty;
                if denom < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                // rho = x_j^T r + ||x_j||^2 * w_j
                let rho = x_c.column(j).dot(&r) + col_norms[j] * w[j];
                let old_wj = w[j];
                w[j] = Self::soft_threshold(rho, l1_penalty) / denom;
                if old_wj != w[j] {
                    r = r + &(&x_c.column(j) * (old_wj - w[j]));
                }
            }

            let diff = (&w - &w_old).mapv(|v| v.abs()).sum();
            if diff < self.tol {
                break;
            }
        }

        self.intercept = Some(y_mean - w.dot(&x_mean));
        self.coefficients = Some(w);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(AutoopError::ModelNotFitted),
        };
        check_features(coefficients.len(), x)?;
        Ok(as_column(x.dot(coefficients) + self.intercept.unwrap_or(0.0)))
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new()
            .with("alpha", self.alpha)
            .with("l1_ratio", self.l1_ratio)
            .with("fit_intercept", if self.fit_intercept { 1.0 } else { 0.0 })
            .with("max_iter", self.max_iter as f64)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Logistic regression
// ═══════════════════════════════════════════════════════════════════════════

/// One binary logistic unit: weights and bias
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryLogit {
    weights: Array1<f64>,
    bias: f64,
}

/// Logistic regression classifier, one-vs-rest over the observed classes,
/// trained with batch gradient descent and L2 regularization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    units: Vec<BinaryLogit>,
    layout: ClassLayout,
    n_features: usize,
    is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            units: Vec::new(),
            layout: ClassLayout::default(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn from_hyperparameters(params: &Hyperparameters) -> Result<Self> {
        Ok(Self::new()
            .with_alpha(params.get_or("alpha", 0.01))
            .with_max_iter(params.get_usize("max_iter", 1000)?)
            .with_learning_rate(params.get_or("learning_rate", 0.1)))
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> BinaryLogit {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        BinaryLogit { weights, bias }
    }

    /// Per-class probabilities, shape `(n, n_classes)`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AutoopError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut proba = Array2::zeros((x.nrows(), self.layout.n_classes()));
        if self.units.is_empty() {
            // single observed class
            proba.fill(1.0);
            return Ok(proba);
        }
        for (c, unit) in self.units.iter().enumerate() {
            let p = Self::sigmoid(&(x.dot(&unit.weights) + unit.bias));
            proba.column_mut(c).assign(&p);
        }
        Ok(proba)
    }
}

impl Model for LogisticRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::LogisticRegression
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let (layout, labels) = ClassLayout::fit(y);

        let units = if layout.n_classes() < 2 {
            Vec::new()
        } else {
            (0..layout.n_classes())
                .map(|c| {
                    let target = Array1::from_iter(
                        labels.iter().map(|&l| if l == c { 1.0 } else { 0.0 }),
                    );
                    self.fit_binary(x, &target)
                })
                .collect()
        };

        self.units = units;
        self.layout = layout;
        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let proba = self.predict_proba(x)?;
        let classes: Vec<usize> = proba
            .rows()
            .into_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect();
        Ok(self.layout.encode(&classes))
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new()
            .with("alpha", self.alpha)
            .with("max_iter", self.max_iter as f64)
            .with("learning_rate", self.learning_rate)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}
