pub mod candidates;
pub mod recommender;
pub mod scoring;

pub use recommender::Recommender;
pub use scoring::{ScoreModel, ScoredCandidate};

/// Errors produced inside the recommendation pipeline.
///
/// Only genuinely unexpected failures cross the pipeline boundary: an
/// unknown user is recovered into a structured payload before it ever
/// reaches the HTTP layer, and an empty candidate set is a valid output,
/// not an error.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The requested user is absent from the mapping after normalization
    /// retries.
    #[error("User {0} is not present in the model")]
    UnknownUser(String),

    /// The prediction call failed or returned malformed data.
    #[error("Model prediction failed: {0}")]
    Prediction(String),

    /// The loaded model violates one of its own invariants.
    #[error("Model state is malformed: {0}")]
    MalformedModel(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
