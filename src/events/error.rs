//! Event decoding errors

use thiserror::Error;

/// Reasons an inbound frame could not be turned into a [`super::StreamEvent`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{kind}' event is missing '{field}'")]
    MissingField { kind: String, field: &'static str },
}

impl DecodeError {
    pub(crate) fn missing(kind: &str, field: &'static str) -> Self {
        DecodeError::MissingField {
            kind: kind.to_string(),
            field,
        }
    }
}
