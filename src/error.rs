use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`ContentSource`](crate::source::ContentSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failures at the post pipeline boundary. Routes turn every variant into a
/// fallback view; none of them reach the runtime.
#[derive(Error, Debug)]
pub enum BlogError {
    #[error("post index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("post `{0}` not found")]
    PostNotFound(String),
    #[error("content for `{slug}` unavailable")]
    ContentUnavailable {
        slug: String,
        #[source]
        source: SourceError,
    },
    #[error("failed to render `{slug}`: {reason}")]
    RenderFailure { slug: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}
