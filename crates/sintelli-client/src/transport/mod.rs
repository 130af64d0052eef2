//! Transport seam between the generation driver and the network.
//!
//! The driver only needs a status code and a byte stream. [`HttpTransport`]
//! is the default `reqwest` implementation; tests plug in in-memory doubles.
mod http;

use std::pin::Pin;

use crate::errors::TransportError;
use crate::request::RequestBody;

pub use http::HttpTransport;

/// Response body as a stream of raw chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// A fully prepared generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    /// Absolute endpoint URL.
    pub url: String,
    /// Bearer token.
    pub api_key: String,
    /// JSON body.
    pub body: RequestBody,
}

/// Status and body of a response whose headers have arrived.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Streaming body; `None` when the response carries no body.
    pub body: Option<ByteStream>,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Issues generation requests.
///
/// Implementations must stop all work for a request once the returned future
/// or body stream is dropped; the driver relies on dropping them to cancel.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and resolves once response headers are available.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
