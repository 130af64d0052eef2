use std::time::Duration;

/// Errors returned while building a client, before any generation starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration (missing key in the environment, HTTP
    /// client construction failure, etc.).
    #[error("config error: {0}")]
    Config(String),
}

/// Failure reported by a [`Transport`](crate::transport::Transport) before it
/// is normalized into a [`GenerationError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Whether the transport itself gave up because a timeout elapsed.
    pub timed_out: bool,
}

impl TransportError {
    /// Creates a transport error that is not timeout related.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a transport error caused by a transport-level timeout.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Input rejected before any network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionFailure {
    /// The client has no API key configured.
    #[error("API key is not configured")]
    MissingApiKey,
    /// The client has an empty base URL.
    #[error("base URL is not configured")]
    MissingBaseUrl,
    /// The prompt is empty or whitespace only.
    #[error("prompt must not be empty")]
    EmptyPrompt,
    /// A new session was requested without a model id.
    #[error("model_id is required for a new session")]
    MissingModelId,
}

/// Terminal failure of a generation, yielded as the last element of a
/// [`GenerationStream`](crate::GenerationStream).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The request was rejected locally; no request was sent.
    #[error("precondition failed: {0}")]
    Precondition(PreconditionFailure),
    /// The server sent an `error` record.
    #[error("server reported an error: {message}")]
    Protocol { message: String },
    /// The request or the response body failed at the transport level
    /// (non-success status, missing body, network failure).
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The generation deadline elapsed before a `completed` record arrived.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    /// The caller fired the abort handle.
    #[error("generation cancelled")]
    Cancelled,
    /// The response body ended without a `completed` record.
    #[error("response stream ended before completion")]
    StreamEnded,
}

impl GenerationError {
    pub(crate) fn transport(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code,
        }
    }

    /// Returns `true` when the generation hit its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` when the request never left the client.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Returns the HTTP status code for non-success responses.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl From<PreconditionFailure> for GenerationError {
    fn from(value: PreconditionFailure) -> Self {
        GenerationError::Precondition(value)
    }
}

/// Maps a transport failure onto the terminal generation error, keeping
/// transport-reported timeouts distinguishable.
pub(crate) fn generation_error_from_transport(
    err: TransportError,
    timeout: Duration,
) -> GenerationError {
    if err.timed_out {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::transport(err.message, None)
    }
}
