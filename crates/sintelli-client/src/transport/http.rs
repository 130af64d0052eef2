use futures::StreamExt as _;
use tracing::debug;

use super::{ByteStream, Transport, TransportRequest, TransportResponse};
use crate::errors::{ClientError, TransportError};

/// `reqwest`-backed transport.
///
/// The generation deadline is enforced by the driver, so the HTTP client
/// itself is built without a total timeout.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with a fresh HTTP client.
    pub fn new() -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing HTTP client (custom proxies, TLS roots, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .bearer_auth(&request.api_key)
            .json(&request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!(status, url = %request.url, "generation response headers received");
        if response.content_length() == Some(0) {
            return Ok(TransportResponse { status, body: None });
        }

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from)),
        );
        Ok(TransportResponse {
            status,
            body: Some(body),
        })
    }
}
