//! Error taxonomy for the punctuality pipeline.
//!
//! Only structural problems surface as errors. Sequence gaps, journey ends and
//! missing weather candidates are boundary conditions and show up as `None`
//! fields on the affected rows instead.

use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Identity columns are absent. Aborts the batch.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// Out-of-order optimizer usage or a malformed linear program.
    #[error("solver: {0}")]
    Solver(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn missing_column(column: &str) -> Self {
        PipelineError::DataIntegrity(format!("required column '{column}' is absent"))
    }
}
