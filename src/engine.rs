//! The linear bandit engine: per-arm ridge models, parallel fit/predict,
//! epsilon-greedy override, and arm lifecycle.
//!
//! ## Parallel execution model
//!
//! Two embarrassingly parallel phases run on an optional per-engine rayon
//! pool (`workers == 1` stays on the caller thread):
//!
//! - **Fit**: one task per arm with data. Each task fits a private clone of
//!   that arm's model; the engine thread commits successful clones back.
//!   A singular matrix on one arm never aborts or corrupts its siblings --
//!   failures are collected and re-raised tagged with the offending arms.
//! - **Predict**: one task per context row. All randomness for a row --
//!   the epsilon coin and any Thompson draws -- flows from a seed derived
//!   from `(master seed, row index)`, so results are bit-identical for any
//!   worker count and scheduling order. Workers read the model map through
//!   shared immutable borrows; predict never mutates engine state.
//!
//! The model map is mutated only by the thread driving fit/lifecycle calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::BanditError;
use crate::ridge::{Exploration, RidgeModel};
use crate::sampling::{create_rng, row_seed};

/// Arm identifier: opaque, totally ordered, cheap to clone.
///
/// Blanket-implemented; integers and strings qualify. The `Ord` order is the
/// engine's canonical arm order, used for score maps and argmax tie-breaks.
pub trait Arm: Clone + Ord + fmt::Debug + Send + Sync {}

impl<T: Clone + Ord + fmt::Debug + Send + Sync> Arm for T {}

/// Configuration for [`LinearBandit`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearConfig {
    /// Exploration strategy shared by every arm's model.
    pub exploration: Exploration,
    /// Exploration strength (UCB bonus weight / Thompson covariance scale).
    /// Must be finite and >= 0.
    pub alpha: f64,
    /// Epsilon-greedy override probability in `[0, 1]`. When the per-row coin
    /// fires, every arm's score is replaced by an independent uniform draw.
    pub epsilon: f64,
    /// Ridge regularization strength (must be finite and > 0).
    pub l2_lambda: f64,
    /// Standardize context features per arm before fit/predict.
    pub scale: bool,
    /// Degree of parallelism for fit/predict (1 = run on the caller thread).
    /// Results are identical for any value.
    pub workers: usize,
    /// Master seed; every prediction row derives its own seed from this and
    /// the row index, so predict is a pure function of engine state.
    pub seed: u64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            exploration: Exploration::Ridge,
            alpha: 1.0,
            epsilon: 0.0,
            l2_lambda: 1.0,
            scale: false,
            workers: 1,
            seed: 0,
        }
    }
}

/// Contextual multi-armed bandit over per-arm online ridge regression.
///
/// ```rust
/// use linarm::{LinearBandit, LinearConfig};
///
/// let mut engine = LinearBandit::new(vec![1, 2, 3], LinearConfig::default()).unwrap();
/// engine.fit(
///     &[1, 1, 2, 3],
///     &[1.0, 0.0, 1.0, 0.5],
///     &[vec![1.0], vec![1.0], vec![1.0], vec![1.0]],
/// ).unwrap();
/// let choices = engine.predict(&[vec![1.0]]).unwrap();
/// assert_eq!(choices.len(), 1);
/// ```
#[derive(Clone)]
pub struct LinearBandit<A: Arm> {
    cfg: LinearConfig,
    models: BTreeMap<A, RidgeModel>,
    num_features: Option<usize>,
    // (cold arm, donor arm) pairs awaiting a deep copy at the next
    // partial_fit reconciliation.
    pending_warm_starts: Vec<(A, A)>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<A: Arm> fmt::Debug for LinearBandit<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearBandit")
            .field("cfg", &self.cfg)
            .field("arms", &self.models.keys().collect::<Vec<_>>())
            .field("num_features", &self.num_features)
            .field("pending_warm_starts", &self.pending_warm_starts)
            .finish()
    }
}

impl<A: Arm> LinearBandit<A> {
    /// Create an engine over `arms`. Models are registered empty and
    /// initialized lazily at the first [`fit`][Self::fit].
    pub fn new(arms: Vec<A>, cfg: LinearConfig) -> Result<Self, BanditError> {
        if arms.is_empty() {
            return Err(BanditError::EmptyInput("arms"));
        }
        if !cfg.alpha.is_finite() || cfg.alpha < 0.0 {
            return Err(BanditError::InvalidConfig("alpha must be finite and >= 0"));
        }
        if !cfg.epsilon.is_finite() || !(0.0..=1.0).contains(&cfg.epsilon) {
            return Err(BanditError::InvalidConfig("epsilon must be in [0, 1]"));
        }
        if !cfg.l2_lambda.is_finite() || cfg.l2_lambda <= 0.0 {
            return Err(BanditError::InvalidConfig("l2_lambda must be finite and > 0"));
        }
        if cfg.workers == 0 {
            return Err(BanditError::InvalidConfig("workers must be >= 1"));
        }

        let mut models = BTreeMap::new();
        for arm in arms {
            if models
                .insert(arm.clone(), Self::blank_model(&cfg))
                .is_some()
            {
                return Err(BanditError::DuplicateArm(format!("{arm:?}")));
            }
        }

        let pool = if cfg.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.workers)
                .build()
                .map_err(|e| BanditError::WorkerPool(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            cfg,
            models,
            num_features: None,
            pending_warm_starts: Vec::new(),
            pool,
        })
    }

    fn blank_model(cfg: &LinearConfig) -> RidgeModel {
        RidgeModel::new(cfg.exploration, cfg.alpha, cfg.l2_lambda, cfg.scale)
    }

    /// The engine's configuration.
    pub fn config(&self) -> &LinearConfig {
        &self.cfg
    }

    /// Known arms in canonical order.
    pub fn arms(&self) -> Vec<A> {
        self.models.keys().cloned().collect()
    }

    /// Feature dimensionality, fixed by the first [`fit`][Self::fit].
    pub fn num_features(&self) -> Option<usize> {
        self.num_features
    }

    /// Read access to one arm's model (diagnostics, tests).
    pub fn model(&self, arm: &A) -> Option<&RidgeModel> {
        self.models.get(arm)
    }

    /// Train from scratch: establishes the feature dimensionality, resets
    /// every arm to the zero state, discards pending warm starts, then fits
    /// each arm on its share of the rows in parallel.
    ///
    /// Arms with no assigned rows stay at `beta = 0`, `A = λI`.
    pub fn fit(
        &mut self,
        decisions: &[A],
        rewards: &[f64],
        contexts: &[Vec<f64>],
    ) -> Result<(), BanditError> {
        if contexts.is_empty() {
            return Err(BanditError::EmptyInput("contexts"));
        }
        let dim = contexts[0].len();
        if dim == 0 {
            return Err(BanditError::EmptyInput("context row"));
        }
        self.check_training_input(decisions, rewards, contexts, dim)?;

        debug!(
            rows = decisions.len(),
            arms = self.models.len(),
            dim,
            "fit: resetting arm models"
        );
        self.num_features = Some(dim);
        for model in self.models.values_mut() {
            model.init(dim);
        }
        self.pending_warm_starts.clear();

        self.fit_partitioned(decisions, rewards, contexts)
    }

    /// Append a batch to the existing sufficient statistics without resetting.
    ///
    /// Executes pending warm-start copies as part of this fit cycle: each
    /// cold arm receives a deep copy of its donor's state as committed at the
    /// end of this call, so a donor trained by this very batch donates its
    /// *post*-fit state.
    pub fn partial_fit(
        &mut self,
        decisions: &[A],
        rewards: &[f64],
        contexts: &[Vec<f64>],
    ) -> Result<(), BanditError> {
        let dim = self.num_features.ok_or(BanditError::NotFitted)?;
        self.check_training_input(decisions, rewards, contexts, dim)?;

        let fit_result = self.fit_partitioned(decisions, rewards, contexts);

        // Reconcile warm starts even when some unrelated arm failed: the
        // donor copies only ever read committed state.
        let pending = std::mem::take(&mut self.pending_warm_starts);
        for (cold, donor) in pending {
            trace!(?cold, ?donor, "warm start: copying donor model");
            if let Some(donor_model) = self.models.get(&donor).cloned() {
                if let Some(slot) = self.models.get_mut(&cold) {
                    *slot = donor_model;
                }
            }
        }
        fit_result
    }

    /// For each context row, the arm with the maximal score (first arm in
    /// canonical order among maxima).
    pub fn predict(&self, contexts: &[Vec<f64>]) -> Result<Vec<A>, BanditError> {
        let rows = self.score_rows(contexts)?;
        Ok(rows
            .into_iter()
            .map(|scores| {
                // Strict `>` keeps the first-in-order arm on ties.
                let mut it = scores.into_iter();
                let (mut best, mut best_score) = it.next().expect("engine has at least one arm");
                for (arm, score) in it {
                    if score > best_score {
                        best = arm;
                        best_score = score;
                    }
                }
                best
            })
            .collect())
    }

    /// For each context row, the full arm-to-score map in canonical order.
    pub fn predict_expectations(
        &self,
        contexts: &[Vec<f64>],
    ) -> Result<Vec<BTreeMap<A, f64>>, BanditError> {
        let rows = self.score_rows(contexts)?;
        Ok(rows.into_iter().map(BTreeMap::from_iter).collect())
    }

    /// Register a new arm.
    ///
    /// Cold start: the arm's model is zero-initialized immediately when the
    /// engine has been fit. Warm start: with `donor` given, the donor's model
    /// is additionally deep-copied into the new arm at the next
    /// [`partial_fit`][Self::partial_fit] reconciliation (deferred, per the
    /// pending-copy queue).
    pub fn add_arm(&mut self, arm: A, donor: Option<A>) -> Result<(), BanditError> {
        if self.models.contains_key(&arm) {
            return Err(BanditError::DuplicateArm(format!("{arm:?}")));
        }
        if let Some(donor) = &donor {
            if !self.models.contains_key(donor) {
                return Err(BanditError::UnknownArm(format!("{donor:?}")));
            }
        }

        let mut model = Self::blank_model(&self.cfg);
        if let Some(dim) = self.num_features {
            model.init(dim);
        }
        self.models.insert(arm.clone(), model);
        if let Some(donor) = donor {
            self.pending_warm_starts.push((arm, donor));
        }
        Ok(())
    }

    /// Remove an arm and any pending warm starts referencing it. Subsequent
    /// predictions omit it.
    pub fn remove_arm(&mut self, arm: &A) -> Result<(), BanditError> {
        if self.models.remove(arm).is_none() {
            return Err(BanditError::UnknownArm(format!("{arm:?}")));
        }
        self.pending_warm_starts
            .retain(|(cold, donor)| cold != arm && donor != arm);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Eager input validation; no arm state mutates when this fails.
    fn check_training_input(
        &self,
        decisions: &[A],
        rewards: &[f64],
        contexts: &[Vec<f64>],
        dim: usize,
    ) -> Result<(), BanditError> {
        if decisions.len() != rewards.len() || decisions.len() != contexts.len() {
            return Err(BanditError::LengthMismatch {
                decisions: decisions.len(),
                rewards: rewards.len(),
                contexts: contexts.len(),
            });
        }
        for row in contexts {
            if row.len() != dim {
                return Err(BanditError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
        }
        for arm in decisions {
            if !self.models.contains_key(arm) {
                return Err(BanditError::UnknownArm(format!("{arm:?}")));
            }
        }
        Ok(())
    }

    /// Partition rows by arm and fit each arm's model in parallel. Successful
    /// models are committed; failures aggregate into one `Singular` error
    /// after every sibling has completed.
    fn fit_partitioned(
        &mut self,
        decisions: &[A],
        rewards: &[f64],
        contexts: &[Vec<f64>],
    ) -> Result<(), BanditError> {
        let mut by_arm: BTreeMap<&A, Vec<usize>> = BTreeMap::new();
        for (i, arm) in decisions.iter().enumerate() {
            by_arm.entry(arm).or_default().push(i);
        }

        // One work item per arm with data; each task owns a private clone.
        let items: Vec<(A, RidgeModel, Vec<Vec<f64>>, Vec<f64>)> = by_arm
            .into_iter()
            .map(|(arm, indices)| {
                let rows: Vec<Vec<f64>> = indices.iter().map(|&i| contexts[i].clone()).collect();
                let ys: Vec<f64> = indices.iter().map(|&i| rewards[i]).collect();
                (arm.clone(), self.models[arm].clone(), rows, ys)
            })
            .collect();

        let results = self.run_tasks(items, |(arm, mut model, rows, ys)| {
            let outcome = model.fit(&rows, &ys).map(|_| model);
            (arm, outcome)
        });

        let mut singular: Vec<String> = Vec::new();
        for (arm, outcome) in results {
            match outcome {
                Ok(model) => {
                    self.models.insert(arm, model);
                }
                Err(_) => singular.push(format!("{arm:?}")),
            }
        }
        if singular.is_empty() {
            Ok(())
        } else {
            Err(BanditError::Singular { arms: singular })
        }
    }

    /// Score every arm on every row. Each row's randomness is derived from
    /// `(master seed, row index)`, making the result independent of worker
    /// count and of any previous predict calls.
    fn score_rows(&self, contexts: &[Vec<f64>]) -> Result<Vec<Vec<(A, f64)>>, BanditError> {
        let dim = self.num_features.ok_or(BanditError::NotFitted)?;
        if self.models.is_empty() {
            return Err(BanditError::EmptyInput("arms"));
        }
        for row in contexts {
            if row.len() != dim {
                return Err(BanditError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
        }
        trace!(rows = contexts.len(), arms = self.models.len(), "predict");

        let items: Vec<(usize, &Vec<f64>)> = contexts.iter().enumerate().collect();
        Ok(self.run_tasks(items, |(index, row)| self.score_row(index, row)))
    }

    fn score_row(&self, index: usize, x: &[f64]) -> Vec<(A, f64)> {
        let seed = row_seed(self.cfg.seed, index);
        let mut coin = create_rng(seed);

        if coin.random::<f64>() < self.cfg.epsilon {
            // Override: every arm gets an independent uniform draw from the
            // row RNG, in canonical arm order.
            self.models
                .keys()
                .map(|arm| (arm.clone(), coin.random::<f64>()))
                .collect()
        } else {
            // One model RNG per row, re-seeded from the same row seed and
            // shared across arms in canonical order.
            let mut model_rng = create_rng(seed);
            self.models
                .iter()
                .map(|(arm, model)| (arm.clone(), model.predict(x, &mut model_rng)))
                .collect()
        }
    }

    /// Order-preserving map over work items: sequential for `workers == 1`,
    /// otherwise on the engine's pool. The indexed parallel collect returns
    /// results in input order regardless of completion order.
    fn run_tasks<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
            None => items.into_iter().map(f).collect(),
        }
    }
}
