//! `linarm`: deterministic linear contextual bandits.
//!
//! Given a context vector, choose the arm expected to maximize reward, and
//! keep refining that choice from observed `(context, decision, reward)`
//! triples. The crate implements the linear-model policy family:
//!
//! - **Plain ridge** ([`Exploration::Ridge`]): per-arm online ridge
//!   regression, score `x·beta`. Exploitation-only baseline.
//! - **LinUCB** ([`Exploration::Ucb`]): ridge plus a deterministic confidence
//!   bonus `α·√(xᵗA⁻¹x)`.
//! - **LinTS** ([`Exploration::Thompson`]): ridge plus posterior sampling,
//!   `x·β̃` with `β̃ ~ N(beta, α²·A⁻¹)`.
//!
//! All three share one sufficient-statistics update path; the strategy is a
//! closed tag dispatched at prediction time ([`Exploration`]), so there is no
//! virtual call in the per-row scoring loop.
//!
//! **Goals:**
//! - **Deterministic by default**: predictions are a pure function of
//!   `(engine state, master seed, row index)`. Thompson draws and the
//!   epsilon-greedy coin for a row are re-derived from the master seed and
//!   the row's position — never from wall-clock time or worker identity —
//!   so results are bit-identical for worker counts 1, 2, N.
//! - **Parallel where it is embarrassing**: fit runs one task per arm,
//!   predict one task per row, on a per-engine rayon pool.
//! - **Failure isolation**: a singular design matrix on one arm is reported
//!   tagged with that arm after its siblings commit, never masking their
//!   updates.
//!
//! # Example
//!
//! ```rust
//! use linarm::{Exploration, LinearBandit, LinearConfig};
//!
//! let cfg = LinearConfig {
//!     exploration: Exploration::Ucb,
//!     alpha: 1.0,
//!     ..LinearConfig::default()
//! };
//! let mut engine = LinearBandit::new(vec!["a", "b"], cfg).unwrap();
//!
//! engine.fit(
//!     &["a", "a", "b"],
//!     &[1.0, 0.8, 0.1],
//!     &[vec![1.0, 0.0], vec![1.0, 0.2], vec![0.0, 1.0]],
//! ).unwrap();
//!
//! let picks = engine.predict(&[vec![1.0, 0.0]]).unwrap();
//! assert_eq!(picks, vec!["a"]);
//! ```
//!
//! **Non-goals:** persistence formats, network protocols, hyperparameter
//! search, and the non-linear policy families (context-free epsilon-greedy,
//! UCB1, Thompson-Beta, neighborhood policies) — those live with the caller.

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod linalg;

mod sampling;

mod scaler;
pub use scaler::*;

mod ridge;
pub use ridge::{Exploration, RidgeModel};

mod engine;
pub use engine::*;
