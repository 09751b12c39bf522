use thiserror::Error;

use crate::resources::TemplateError;

/// Failures surfaced by the response pipeline.
///
/// Classification drift and malformed extraction output are absorbed into
/// safe defaults and never show up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No credential configured for the LLM provider.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The provider call failed. Not retried.
    #[error("{stage} request failed: {source:#}")]
    Gateway {
        stage: &'static str,
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn missing_credential(var: &str) -> Self {
        Self::Configuration(format!(
            "Missing {var}. Set it in your environment or .env file."
        ))
    }

    pub fn gateway(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Gateway { stage, source }
    }
}
