use thiserror::Error;

/// Malformed query or advanced-option text.
///
/// Every variant names the flag or option key that could not be read, so the
/// front end can point the user at the offending part of the string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("flag '{flag}' expects a value")]
    MissingValue { flag: String },

    #[error("flag '{flag}' has invalid value '{value}': expected {expected}")]
    InvalidValue {
        flag: String,
        value: String,
        expected: &'static str,
    },

    #[error("unbalanced quotes in query")]
    UnbalancedQuotes,

    #[error("advanced option segment '{segment}' has an empty key")]
    EmptyOptionKey { segment: String },

    #[error("advanced option '{key}' has invalid value '{value}': expected {expected}")]
    InvalidOptionValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl ParseError {
    pub(crate) fn invalid(flag: &str, value: &str, expected: &'static str) -> Self {
        ParseError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    pub(crate) fn invalid_option(key: &str, value: &str, expected: &'static str) -> Self {
        ParseError::InvalidOptionValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

/// Preset store failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("preset file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid preset name {0:?}: names must be non-empty and contain no tab or newline")]
    InvalidName(String),

    #[error("query for preset '{0}' contains a newline")]
    InvalidQuery(String),
}

/// Job supervisor failures
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("an encode is already running (job {job_id})")]
    AlreadyRunning { job_id: uuid::Uuid },

    #[error("failed to launch encoder '{executable}': {source}")]
    Launch {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for encoder process: {0}")]
    Wait(String),
}
