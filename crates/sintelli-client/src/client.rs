use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::generation::{GenerationBuilder, GenerationStream};
use crate::model::{ModelId, SessionId};
use crate::request::GenerationRequest;
use crate::session::Session;
use crate::transport::{HttpTransport, Transport, TransportRequest};

pub(crate) struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

/// Entry point for starting generations against the Sintelli API.
///
/// Cheap to clone; clones share the configuration and the transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Starts a builder for configuring a `Client`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client with the default HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder().config(config).build()
    }

    /// Creates a client from `SINTELLI_API_KEY` / `SINTELLI_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Starts a generation.
    ///
    /// Never fails synchronously: precondition failures surface as the single
    /// `Err` element of the returned stream, and no request is sent.
    pub fn generate(&self, request: GenerationRequest) -> GenerationStream {
        match request.prepare(&self.inner.config) {
            Ok((body, timeout)) => GenerationStream::start(
                self.inner.transport.clone(),
                TransportRequest {
                    url: self.inner.config.generate_url(),
                    api_key: self.inner.config.api_key.clone(),
                    body,
                },
                timeout,
            ),
            Err(failure) => {
                warn!(error = %failure, "generation rejected before sending");
                GenerationStream::rejected(failure.into())
            }
        }
    }

    /// Starts building a generation for the given prompt.
    pub fn generation(&self, prompt: impl Into<String>) -> GenerationBuilder {
        GenerationBuilder::new(self.clone(), GenerationRequest::new(prompt))
    }

    /// Creates a conversation that opens a new server session on first use.
    pub fn session(&self, model_id: impl Into<ModelId>) -> Session {
        Session::new(self.clone(), model_id.into(), None)
    }

    /// Creates a conversation continuing an existing server session.
    pub fn resume_session(
        &self,
        model_id: impl Into<ModelId>,
        session_id: impl Into<SessionId>,
    ) -> Session {
        Session::new(self.clone(), model_id.into(), Some(session_id.into()))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url)
            .field("default_timeout", &self.inner.config.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder used to configure a `Client`.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig::new(""),
            transport: None,
        }
    }
}

impl ClientBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Sets the deadline for generations that do not set their own.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Uses a custom transport instead of the default HTTP one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    ///
    /// A missing API key is not rejected here; it fails each generation as a
    /// precondition instead.
    pub fn build(self) -> Result<Client, ClientError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
            }),
        })
    }
}
