//! Error taxonomy for a copymedia run.
//!
//! Fatal configuration problems are raised before any file operation;
//! per-candidate conditions abort only the candidate they belong to.

/// Typed errors surfaced by configuration loading and media processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required scan source or destination root is missing at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A configured series rule is missing or has an unusable field.
    #[error("series rule has a missing or invalid `{field}` field")]
    RuleValidation { field: &'static str },

    /// An episode-renumbering rule fired on a name with no SxxEyy token.
    #[error("no season/episode token found in [{name}] for episode renumbering")]
    PatternMismatch { name: String },

    /// Movie renaming could not determine both a title and a year.
    #[error("could not determine both title and year from [{name}]")]
    MetadataIncomplete { name: String },
}

impl Error {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}
