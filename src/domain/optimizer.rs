//! Single-window maximum-Sharpe weight solver.
//!
//! Expected returns and covariance are estimated from the returns inside the
//! window, both annualized. The long-only, fully invested max-Sharpe problem
//!
//! ```text
//! maximize (wᵀμ − rf) / sqrt(wᵀΣw)   s.t.  Σw = 1,  0 <= w <= 1
//! ```
//!
//! is solved through the homogenised form
//!
//! ```text
//! minimize yᵀΣy   s.t.  (μ − rf)ᵀy = 1,  y >= 0        then  w = y / Σy
//! ```
//!
//! with a primal active-set method. Only the covariance sub-block of the
//! assets currently held is factored, so an asset that never enters the
//! portfolio (e.g. zero variance, negative excess return) cannot make the
//! solve singular.

use crate::domain::series::{PriceSeries, TRADING_DAYS_PER_YEAR, WeightVector};
use nalgebra::{DMatrix, DVector};

/// Smallest accepted eigenvalue ratio of a factored covariance block.
const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedReturns {
    /// Compounded: `(Π(1 + r))^(252 / n) − 1`.
    Geometric,
    /// `mean(r) × 252`.
    Arithmetic,
}

/// Opt-in post-processing applied after the solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCleaning {
    /// Weights with absolute value below this become exactly zero.
    pub cutoff: f64,
    /// Decimal places to round to, if any.
    pub rounding: Option<u32>,
}

impl Default for WeightCleaning {
    fn default() -> Self {
        Self {
            cutoff: 1e-4,
            rounding: Some(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub risk_free_rate: f64,
    pub expected_returns: ExpectedReturns,
    pub weight_cleaning: Option<WeightCleaning>,
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            expected_returns: ExpectedReturns::Geometric,
            weight_cleaning: None,
            max_iterations: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizationError {
    #[error("window contains non-finite prices or returns")]
    NonFiniteInput,

    #[error("{observations} return observations cannot identify a covariance for {assets} assets")]
    TooFewObservations { observations: usize, assets: usize },

    #[error("no asset has an expected return above the risk-free rate {risk_free_rate}")]
    NoPositiveExcessReturn { risk_free_rate: f64 },

    #[error("covariance matrix is singular or ill-conditioned")]
    SingularCovariance,

    #[error("solver did not converge in {iterations} iterations")]
    DidNotConverge { iterations: usize },
}

/// Annualized return and risk estimates for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub expected_returns: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub observations: usize,
}

pub fn estimate_moments(
    window: &PriceSeries,
    method: ExpectedReturns,
) -> Result<Moments, OptimizationError> {
    let returns = window.returns();
    let observations = returns.len();
    let assets = returns.tickers().len();

    if observations <= assets || observations < 2 {
        return Err(OptimizationError::TooFewObservations {
            observations,
            assets,
        });
    }

    let columns: Vec<&[f64]> = (0..assets).map(|i| returns.column(i)).collect();
    if columns.iter().any(|c| c.iter().any(|r| !r.is_finite())) {
        return Err(OptimizationError::NonFiniteInput);
    }

    let n = observations as f64;
    let means: Vec<f64> = columns.iter().map(|c| c.iter().sum::<f64>() / n).collect();

    let expected_returns = DVector::from_iterator(
        assets,
        columns.iter().zip(&means).map(|(c, mean)| match method {
            ExpectedReturns::Geometric => {
                let growth: f64 = c.iter().map(|r| 1.0 + r).product();
                growth.powf(TRADING_DAYS_PER_YEAR / n) - 1.0
            }
            ExpectedReturns::Arithmetic => mean * TRADING_DAYS_PER_YEAR,
        }),
    );

    let mut covariance = DMatrix::zeros(assets, assets);
    for i in 0..assets {
        for j in i..assets {
            let cross: f64 = columns[i]
                .iter()
                .zip(columns[j])
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum();
            let value = cross / (n - 1.0) * TRADING_DAYS_PER_YEAR;
            covariance[(i, j)] = value;
            covariance[(j, i)] = value;
        }
    }

    if expected_returns.iter().any(|m| !m.is_finite()) {
        return Err(OptimizationError::NonFiniteInput);
    }

    Ok(Moments {
        expected_returns,
        covariance,
        observations,
    })
}

/// Equality-constrained minimizer over the free set `idx` (all other
/// positions held at zero). Returns the free-block solution and the
/// multiplier of the return constraint.
fn solve_free_block(
    covariance: &DMatrix<f64>,
    excess: &DVector<f64>,
    idx: &[usize],
) -> Result<(DVector<f64>, f64), OptimizationError> {
    let k = idx.len();
    let block = DMatrix::from_fn(k, k, |r, c| covariance[(idx[r], idx[c])]);
    let a = DVector::from_fn(k, |r, _| excess[idx[r]]);

    let eigen = block.clone().symmetric_eigen().eigenvalues;
    let largest = eigen.max();
    let smallest = eigen.min();
    if !(largest > 0.0) || smallest / largest < MIN_RECIPROCAL_CONDITION {
        return Err(OptimizationError::SingularCovariance);
    }

    let chol = block
        .cholesky()
        .ok_or(OptimizationError::SingularCovariance)?;
    let x = chol.solve(&a);
    let denom = a.dot(&x);
    if !(denom.is_finite() && denom > 0.0) {
        return Err(OptimizationError::SingularCovariance);
    }

    Ok((x / denom, 1.0 / denom))
}

/// Long-only max-Sharpe weights, summing to 1, in the order of `moments`.
pub fn max_sharpe(
    moments: &Moments,
    risk_free_rate: f64,
    max_iterations: usize,
) -> Result<Vec<f64>, OptimizationError> {
    let covariance = &moments.covariance;
    let n = moments.expected_returns.len();
    let excess = moments.expected_returns.map(|m| m - risk_free_rate);

    // Start from the single asset with the largest excess return.
    let mut start = 0;
    for i in 1..n {
        if excess[i] > excess[start] {
            start = i;
        }
    }
    if n == 0 || !(excess[start] > 0.0) {
        return Err(OptimizationError::NoPositiveExcessReturn { risk_free_rate });
    }

    let mut y = DVector::zeros(n);
    y[start] = 1.0 / excess[start];
    let mut free = vec![false; n];
    free[start] = true;

    for _ in 0..max_iterations {
        let idx: Vec<usize> = (0..n).filter(|&i| free[i]).collect();
        let (block, nu) = solve_free_block(covariance, &excess, &idx)?;

        let mut target = DVector::zeros(n);
        for (k, &i) in idx.iter().enumerate() {
            target[i] = block[k];
        }

        // Step toward the block solution, stopping at the first bound hit.
        let mut step = 1.0;
        let mut blocking = None;
        for &i in &idx {
            if target[i] < 0.0 {
                let ratio = y[i] / (y[i] - target[i]);
                if ratio < step {
                    step = ratio;
                    blocking = Some(i);
                }
            }
        }
        if let Some(b) = blocking {
            y += (&target - &y) * step;
            y[b] = 0.0;
            free[b] = false;
            continue;
        }
        y = target;

        // Bound multipliers: a negative one means releasing that asset helps.
        let gradient = covariance * &y;
        let tolerance = 1e-10 * (1.0 + gradient.amax());
        let mut entering = None;
        let mut most_negative = -tolerance;
        for i in (0..n).filter(|&i| !free[i]) {
            let multiplier = gradient[i] - nu * excess[i];
            if multiplier < most_negative {
                most_negative = multiplier;
                entering = Some(i);
            }
        }

        match entering {
            Some(i) => free[i] = true,
            None => {
                let total = y.sum();
                return Ok(y.iter().map(|v| v / total).collect());
            }
        }
    }

    Err(OptimizationError::DidNotConverge {
        iterations: max_iterations,
    })
}

/// Zeroes weights below the cutoff, then rounds. Weights are not renormalized.
/// Rounding is skipped when `10^places` overflows an f64.
pub fn clean_weights(weights: &[f64], cleaning: &WeightCleaning) -> Vec<f64> {
    let scale = cleaning
        .rounding
        .and_then(|places| i32::try_from(places).ok())
        .map(|places| 10f64.powi(places))
        .filter(|scale| scale.is_finite());
    weights
        .iter()
        .map(|&w| {
            let w = if w.abs() < cleaning.cutoff { 0.0 } else { w };
            match scale {
                Some(scale) => (w * scale).round() / scale,
                None => w,
            }
        })
        .collect()
}

/// Produces the weight vector for one trailing price window.
pub trait WindowOptimizer: Sync {
    fn optimize(&self, window: &PriceSeries) -> Result<WeightVector, OptimizationError>;
}

#[derive(Debug, Clone, Default)]
pub struct MeanVarianceOptimizer {
    pub config: OptimizerConfig,
}

impl MeanVarianceOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }
}

impl WindowOptimizer for MeanVarianceOptimizer {
    /// The vector is dated at the window's last date.
    fn optimize(&self, window: &PriceSeries) -> Result<WeightVector, OptimizationError> {
        let date = window
            .last_date()
            .ok_or(OptimizationError::TooFewObservations {
                observations: 0,
                assets: window.tickers().len(),
            })?;

        let moments = estimate_moments(window, self.config.expected_returns)?;
        let mut weights = max_sharpe(
            &moments,
            self.config.risk_free_rate,
            self.config.max_iterations,
        )?;
        if let Some(cleaning) = &self.config.weight_cleaning {
            weights = clean_weights(&weights, cleaning);
        }

        Ok(WeightVector {
            date,
            weights: window.tickers().iter().cloned().zip(weights).collect(),
        })
    }
}
