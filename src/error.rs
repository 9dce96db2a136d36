//! Top-level error types for issuebot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Chat platform transport errors.
///
/// `Rejected` means the platform accepted the request but refused the
/// payload; its `description` is the platform's own error text. Whether a
/// rejection is a markup-parse failure is decided by exactly one predicate,
/// [`TransportError::is_markup_rejection`]: callers must not match on the
/// description themselves, so the heuristic can be replaced with a
/// structured error code if the platform ever exposes one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("payload rejected by platform: {description}")]
    Rejected { description: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether this error means the platform could not parse the rich
    /// markup in the payload. Only such rejections get the plain-text
    /// retry; everything else propagates.
    pub fn is_markup_rejection(&self) -> bool {
        let TransportError::Rejected { description } = self else {
            return false;
        };
        let description = description.to_ascii_lowercase();
        description.contains("can't parse entities")
            || description.contains("unsupported start tag")
            || description.contains("can't find end of the entity")
    }
}

/// Remote API errors (issue tracker, source hosting, task runner, agent).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn request(service: &'static str, source: reqwest::Error) -> Self {
        ApiError::Request { service, source }
    }

    pub fn decode(service: &'static str, source: impl std::fmt::Display) -> Self {
        ApiError::Decode {
            service,
            message: source.to_string(),
        }
    }
}

/// Voice transcription errors.
#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription response malformed: {0}")]
    Malformed(String),

    #[error("transcript was empty")]
    Empty,
}
