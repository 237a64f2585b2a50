//! Per-arm online ridge regression and its exploration variants.
//!
//! One [`RidgeModel`] owns the sufficient statistics for one arm:
//!
//! ```text
//!   A     = λI + Σ x xᵗ        (d×d design accumulator)
//!   A⁻¹                         (full recompute after every fit)
//!   Xty   = Σ r x               (d)
//!   beta  = A⁻¹ · Xty           (d, ridge coefficients)
//! ```
//!
//! The inverse is recomputed from `A` on every fit rather than maintained by
//! rank-1 Sherman–Morrison updates, which drift under long sequences of small
//! updates. The cost is O(d³) per fit call (not per row), which is negligible
//! at the dimensions these models run at.
//!
//! Exploration is a closed tag over the shared statistics, dispatched at
//! prediction time; the update path is identical for all three variants.

use rand::rngs::StdRng;

use crate::linalg::{add_outer, dot, invert, mat_vec};
use crate::sampling::multivariate_normal;
use crate::scaler::ContextScaler;

/// How a model turns its posterior into a per-context score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Exploration {
    /// Exploitation-only point estimate: `x·beta`.
    #[default]
    Ridge,
    /// Deterministic confidence bonus: `x·beta + α·√(xᵗA⁻¹x)`.
    Ucb,
    /// Thompson Sampling: `x·β̃` with `β̃ ~ N(beta, α²·A⁻¹)`.
    Thompson,
}

/// Marker for a failed design-matrix inversion; the engine tags it with the
/// offending arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SingularMatrix;

/// Ridge regression state for a single arm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RidgeModel {
    exploration: Exploration,
    alpha: f64,
    l2_lambda: f64,
    dim: usize,
    a: Vec<f64>,
    a_inv: Vec<f64>,
    xty: Vec<f64>,
    beta: Vec<f64>,
    scaler: Option<ContextScaler>,
    scale: bool,
}

impl RidgeModel {
    /// A registered-but-uninitialized model; [`init`][Self::init] must run
    /// once the engine's feature dimensionality is known.
    pub(crate) fn new(exploration: Exploration, alpha: f64, l2_lambda: f64, scale: bool) -> Self {
        Self {
            exploration,
            alpha,
            l2_lambda,
            dim: 0,
            a: Vec::new(),
            a_inv: Vec::new(),
            xty: Vec::new(),
            beta: Vec::new(),
            scaler: None,
            scale,
        }
    }

    /// Reset to the zero state for `dim` features: `A = λI`, `A⁻¹ = λ⁻¹I`,
    /// `Xty = 0`, `beta = 0`, fresh scaler. Discards all prior statistics.
    pub(crate) fn init(&mut self, dim: usize) {
        self.dim = dim;
        self.a = vec![0.0; dim * dim];
        self.a_inv = vec![0.0; dim * dim];
        let inv_diag = if self.l2_lambda.is_finite() && self.l2_lambda > 0.0 {
            1.0 / self.l2_lambda
        } else {
            1.0
        };
        for i in 0..dim {
            self.a[i * dim + i] = self.l2_lambda;
            self.a_inv[i * dim + i] = inv_diag;
        }
        self.xty = vec![0.0; dim];
        self.beta = vec![0.0; dim];
        self.scaler = self.scale.then(|| ContextScaler::new(dim));
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.dim > 0
    }

    /// Ridge coefficients (`beta = A⁻¹·Xty`).
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Design accumulator `A`, row-major `d×d`.
    pub fn design_matrix(&self) -> &[f64] {
        &self.a
    }

    /// Accumulated `XᵗY`.
    pub fn xty(&self) -> &[f64] {
        &self.xty
    }

    /// The scaler, when feature scaling is enabled and the model initialized.
    pub fn scaler(&self) -> Option<&ContextScaler> {
        self.scaler.as_ref()
    }

    /// Consume one batch of rows belonging to this arm.
    ///
    /// Updates the scaler (when enabled), accumulates `A` and `Xty`, then
    /// recomputes `A⁻¹` and `beta`. On a singular `A` the error propagates
    /// and the caller must discard this model instance: `a_inv`/`beta` are
    /// stale relative to the updated `A`.
    pub(crate) fn fit(&mut self, rows: &[Vec<f64>], y: &[f64]) -> Result<(), SingularMatrix> {
        let rows = match &mut self.scaler {
            Some(scaler) => {
                scaler.fit_or_update(rows);
                scaler.stabilize();
                rows.iter().map(|r| scaler.transform(r)).collect()
            }
            None => rows.to_vec(),
        };

        for row in &rows {
            add_outer(&mut self.a, self.dim, row);
        }
        self.a_inv = invert(&self.a, self.dim).ok_or(SingularMatrix)?;
        for (row, r) in rows.iter().zip(y.iter()) {
            for (acc, x) in self.xty.iter_mut().zip(row.iter()) {
                *acc += r * x;
            }
        }
        self.beta = mat_vec(&self.a_inv, self.dim, &self.xty);
        Ok(())
    }

    /// Score one context row under this model's exploration strategy.
    ///
    /// `rng` feeds Thompson Sampling only; Ridge and UCB never draw from it,
    /// so a given model state scores deterministically under those tags.
    pub(crate) fn predict(&self, x: &[f64], rng: &mut StdRng) -> f64 {
        let scaled;
        let x = match &self.scaler {
            Some(s) if s.is_fitted() => {
                scaled = s.transform(x);
                &scaled[..]
            }
            _ => x,
        };

        match self.exploration {
            Exploration::Ridge => dot(x, &self.beta),
            Exploration::Ucb => {
                let ax = mat_vec(&self.a_inv, self.dim, x);
                let var = dot(x, &ax).max(0.0);
                dot(x, &self.beta) + self.alpha * var.sqrt()
            }
            Exploration::Thompson => {
                let a2 = self.alpha * self.alpha;
                let cov: Vec<f64> = self.a_inv.iter().map(|v| a2 * v).collect();
                let sampled = multivariate_normal(rng, &self.beta, &cov);
                dot(x, &sampled)
            }
        }
    }
}
