//! Optional per-feature standardization with a numerical-stability guard.
//!
//! The scaler keeps running per-feature mean and (population) variance and
//! blends each new batch into them with a count-weighted two-sample merge,
//! so repeated incremental updates agree with what a single pass over the
//! concatenated data would produce.

/// Standard deviations at or below this are treated as "effectively constant".
const SCALER_TOLERANCE: f64 = 1e-6;

/// Running per-feature standardizer: `transform(x) = (x - mean) / scale`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextScaler {
    mean: Vec<f64>,
    var: Vec<f64>,
    scale: Vec<f64>,
    count: u64,
}

impl ContextScaler {
    pub fn new(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            var: vec![0.0; dim],
            scale: vec![1.0; dim],
            count: 0,
        }
    }

    /// Has at least one batch been seen?
    pub fn is_fitted(&self) -> bool {
        self.count > 0
    }

    /// Per-feature variance. Exactly `0.0` marks a feature whose scale was
    /// clamped to 1.0 by [`stabilize`][Self::stabilize] (near-constant input).
    pub fn variance(&self) -> &[f64] {
        &self.var
    }

    /// Per-feature scale divisor used by [`transform`][Self::transform].
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// First call: compute mean/variance from `rows`. Later calls: blend the
    /// batch statistics into the running estimate (count-weighted merge).
    /// Empty batches are no-ops.
    pub fn fit_or_update(&mut self, rows: &[Vec<f64>]) {
        if rows.is_empty() {
            return;
        }
        let m = rows.len() as f64;
        let dim = self.mean.len();

        let mut batch_mean = vec![0.0; dim];
        for row in rows {
            for (acc, v) in batch_mean.iter_mut().zip(row.iter()) {
                *acc += v;
            }
        }
        for v in &mut batch_mean {
            *v /= m;
        }

        let mut batch_var = vec![0.0; dim];
        for row in rows {
            for ((acc, v), mu) in batch_var.iter_mut().zip(row.iter()).zip(batch_mean.iter()) {
                let d = v - mu;
                *acc += d * d;
            }
        }
        for v in &mut batch_var {
            *v /= m;
        }

        if self.count == 0 {
            self.mean = batch_mean;
            self.var = batch_var;
        } else {
            let n = self.count as f64;
            let total = n + m;
            for i in 0..dim {
                let delta = batch_mean[i] - self.mean[i];
                self.mean[i] += delta * m / total;
                self.var[i] =
                    (n * self.var[i] + m * batch_var[i] + n * m / total * delta * delta) / total;
            }
        }
        self.count += rows.len() as u64;
        for (s, v) in self.scale.iter_mut().zip(self.var.iter()) {
            *s = v.sqrt();
        }
    }

    /// Clamp near-constant features: any feature with standard deviation at or
    /// below the tolerance gets scale exactly 1.0 and variance exactly 0.0,
    /// so `transform` never divides by a vanishing scale while the zeroed
    /// variance stays detectable downstream.
    pub fn stabilize(&mut self) {
        for (s, v) in self.scale.iter_mut().zip(self.var.iter_mut()) {
            if *s <= SCALER_TOLERANCE {
                *s = 1.0;
                *v = 0.0;
            }
        }
    }

    /// Standardize one row. Identity before the first fit.
    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        if self.count == 0 {
            return x.to_vec();
        }
        x.iter()
            .zip(self.mean.iter())
            .zip(self.scale.iter())
            .map(|((v, mu), s)| (v - mu) / s)
            .collect()
    }
}
