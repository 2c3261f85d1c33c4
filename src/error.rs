//! Error taxonomy for the recommendation core.
//!
//! Recommendation requests fail fast and typed: title resolution is
//! deterministic, so an unknown title is never retried, and training-time
//! numeric failures abort engine construction instead of producing a
//! degenerate model.

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    /// A seed title does not match any catalog entry.
    #[error("unknown title: {0:?}")]
    UnknownTitle(String),

    /// A prediction was requested from a model that has not been trained.
    #[error("model not ready: {0}")]
    ModelNotReady(&'static str),

    /// Training produced a non-finite loss or an unsolvable system.
    #[error("training diverged at iteration {iteration} (loss {loss})")]
    TrainingDiverged { iteration: usize, loss: f32 },

    /// Not enough observations to build or query the model.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The catalog violated a construction invariant.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}
