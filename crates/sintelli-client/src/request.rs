use std::time::Duration;

use crate::config::{ClientConfig, DEFAULT_MAX_TOKENS, DEFAULT_ROLE};
use crate::errors::PreconditionFailure;
use crate::model::{ModelId, SessionId};

/// Parameters of one generation.
///
/// Without a `session_id` the request opens a new server session and needs a
/// `model_id`; with one it resumes that session and `model_id` is not sent.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// User prompt (`input` on the wire).
    pub prompt: String,
    /// Optional base64-encoded image attached to the prompt.
    pub image: Option<String>,
    /// Conversation role, `user` by default.
    pub role: String,
    /// Token budget.
    pub max_tokens: u32,
    /// Deadline for the whole generation. Falls back to the client default.
    pub timeout: Option<Duration>,
    /// Session to resume.
    pub session_id: Option<SessionId>,
    /// Model for a new session.
    pub model_id: Option<ModelId>,
}

impl GenerationRequest {
    /// Creates a request with default role and token budget.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            role: DEFAULT_ROLE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
            session_id: None,
            model_id: None,
        }
    }

    /// Attaches a base64-encoded image.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets the conversation role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Sets the token budget.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the generation deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resumes an existing session.
    pub fn session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Selects the model for a new session.
    pub fn model_id(mut self, model_id: impl Into<ModelId>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Checks the request against the client configuration and produces the
    /// wire body together with the effective deadline.
    pub(crate) fn prepare(
        self,
        config: &ClientConfig,
    ) -> Result<(RequestBody, Duration), PreconditionFailure> {
        if !config.has_api_key() {
            return Err(PreconditionFailure::MissingApiKey);
        }
        if !config.has_base_url() {
            return Err(PreconditionFailure::MissingBaseUrl);
        }
        if self.prompt.trim().is_empty() {
            return Err(PreconditionFailure::EmptyPrompt);
        }
        let target = match (self.session_id, self.model_id) {
            (Some(session_id), _) => SessionTarget::Resume { session_id },
            (None, Some(model_id)) => SessionTarget::New { model_id },
            (None, None) => return Err(PreconditionFailure::MissingModelId),
        };
        let timeout = self.timeout.unwrap_or(config.default_timeout);
        let body = RequestBody {
            target,
            input: self.prompt,
            image: self.image,
            role: self.role,
            max_tokens: self.max_tokens,
            timeout: wire_timeout_secs(timeout),
        };
        Ok((body, timeout))
    }
}

/// Deadline in whole seconds, rounded up and at least 1, so the server is
/// never given less time than the client waits.
fn wire_timeout_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

/// Whether a request opens a new session or resumes one.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionTarget {
    /// Open a new session on the given model.
    New { model_id: ModelId },
    /// Continue an existing session.
    Resume { session_id: SessionId },
}

/// JSON body posted to the generation endpoint.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RequestBody {
    #[serde(flatten)]
    pub target: SessionTarget,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub role: String,
    pub max_tokens: u32,
    /// Whole seconds, rounded up.
    pub timeout: u64,
}
