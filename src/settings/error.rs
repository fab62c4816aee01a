use std::error::Error as StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SettingsError {
    #[error("failed to parse settings{}: {cause}", path.as_ref().map(|p| format!(" from `{}`", p)).unwrap_or_default())]
    FileParse {
        path: Option<String>,
        cause: Box<dyn StdError + Send + Sync>,
    },

    #[error("missing value for `{0}`")]
    MissingValue(String),

    #[error("invalid value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}
