//! Error taxonomy for the linear bandit core.
//!
//! Three classes, distinguished by when they surface:
//!
//! - **Input errors** (`LengthMismatch`, `DimensionMismatch`, `EmptyInput`,
//!   `UnknownArm`, `DuplicateArm`): contract violations detected eagerly,
//!   before any parallel work is dispatched and before any arm state mutates.
//! - **Numerical errors** (`Singular`): a near-singular design matrix during a
//!   per-arm fit. Captured inside the worker task and re-raised by the engine
//!   after all sibling arms complete, tagged with the offending arms, so one
//!   degenerate arm does not mask successful updates to the others.
//! - **State errors** (`NotFitted`): `predict` / `partial_fit` called before
//!   any `fit` has established the feature dimensionality.
//!
//! Nothing is retried at this layer; retry policy belongs to the caller.

use thiserror::Error;

/// Errors surfaced by [`LinearBandit`][crate::LinearBandit] and its parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BanditError {
    /// Decisions, rewards, and context rows must agree in length.
    #[error(
        "input length mismatch: {decisions} decisions, {rewards} rewards, {contexts} context rows"
    )]
    LengthMismatch {
        decisions: usize,
        rewards: usize,
        contexts: usize,
    },

    /// A context row does not match the engine's feature dimensionality.
    #[error("context dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The operation requires at least one row / one arm.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// A decision or donor referenced an arm the engine does not know.
    #[error("unknown arm: {0}")]
    UnknownArm(String),

    /// `add_arm` called with an arm that is already registered.
    #[error("duplicate arm: {0}")]
    DuplicateArm(String),

    /// Matrix inversion failed for the listed arms (degenerate / collinear
    /// contexts). Sibling arms' updates are committed before this is raised.
    #[error("singular design matrix for arm(s): {}", arms.join(", "))]
    Singular { arms: Vec<String> },

    /// `predict` / `partial_fit` called before any `fit`.
    #[error("model has not been fitted yet")]
    NotFitted,

    /// Engine configuration out of range (alpha, epsilon, lambda, workers).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The worker pool could not be built.
    #[error("worker pool: {0}")]
    WorkerPool(String),
}
