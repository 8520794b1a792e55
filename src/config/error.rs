use std::path::PathBuf;
use thiserror::Error;

/// Failure to load or check a FleetDeck config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Callers fall back to defaults on this one
    #[error("no config file at {0}")]
    NotFound(PathBuf),

    #[error("config {path} is not valid: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// `config init` will not replace an existing file without `--force`
    #[error("{0} already exists. Use --force to overwrite.")]
    AlreadyExists(PathBuf),

    #[error("cannot write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Dotted config key a validation error refers to.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file_or_key() {
        let err = ConfigError::Parse {
            path: PathBuf::from("/etc/fleetdeck.toml"),
            message: "expected `]`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "config /etc/fleetdeck.toml is not valid: expected `]`"
        );

        let err = ConfigError::invalid("stream.keepalive_interval_ms", "must be non-zero");
        assert_eq!(err.field(), Some("stream.keepalive_interval_ms"));
        assert_eq!(
            err.to_string(),
            "invalid stream.keepalive_interval_ms: must be non-zero"
        );
        assert_eq!(ConfigError::NotFound(PathBuf::from("x")).field(), None);
    }
}
