use crate::guard::MAX_TOKENS;

/// Failures surfaced to the user by the generate command.
#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    #[error("{0}")]
    Setup(String),

    #[error(
        "Too many changes to commit (about {estimated} tokens, limit {limit}). Please commit manually."
    )]
    Oversize { estimated: usize, limit: usize },

    #[error("{0}")]
    Selection(String),

    #[error("{backend} invocation failed: {source:#}")]
    Backend {
        backend: String,
        source: anyhow::Error,
    },

    #[error("Configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("Operation cancelled by the user.")]
    Cancelled,

    #[error("Failed to generate diff: {0:#}")]
    Diff(anyhow::Error),

    #[error("Failed to write commit message: {0:#}")]
    Sink(anyhow::Error),
}

impl GenerateError {
    pub fn oversize(estimated: usize) -> Self {
        Self::Oversize {
            estimated,
            limit: MAX_TOKENS,
        }
    }

    pub fn backend(backend: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Backend {
            backend: backend.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Setup errors abort the whole command; everything else only the current repository.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}
