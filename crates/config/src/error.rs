use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("team not found: {0}")]
    TeamNotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("watcher error: {0}")]
    Watch(String),
}

impl From<ConfigError> for broker_core::BrokerError {
    fn from(e: ConfigError) -> Self {
        broker_core::BrokerError::ConfigError(e.to_string())
    }
}
