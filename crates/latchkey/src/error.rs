//! CLI error types.

use latchkey_config::ConfigError;
use latchkey_oauth::{OAuthError, RsaKeyError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    OAuth(#[from] OAuthError),

    #[error("{0}")]
    Key(#[from] RsaKeyError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}
