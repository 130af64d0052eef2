//! In-memory transport used by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream;

use crate::client::Client;
use crate::errors::TransportError;
use crate::transport::{ByteStream, Transport, TransportRequest, TransportResponse};

/// Scripted reply for one `send` call.
pub(crate) enum FakeResponse {
    /// Status plus body chunks. With `stall` the body never ends after the
    /// last chunk, like a server that keeps the connection open.
    Body {
        status: u16,
        chunks: Vec<Result<Bytes, TransportError>>,
        stall: bool,
    },
    /// Headers without a body.
    Empty { status: u16 },
    /// `send` itself fails.
    Fail(TransportError),
    /// `send` never resolves.
    Hang,
}

impl FakeResponse {
    pub(crate) fn body(chunks: Vec<Vec<u8>>) -> Self {
        Self::Body {
            status: 200,
            chunks: chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect(),
            stall: false,
        }
    }

    pub(crate) fn stalled_body(chunks: Vec<Vec<u8>>) -> Self {
        match Self::body(chunks) {
            Self::Body { status, chunks, .. } => Self::Body {
                status,
                chunks,
                stall: true,
            },
            other => other,
        }
    }
}

/// Joins records into an NDJSON payload.
pub(crate) fn ndjson(lines: &[&str]) -> Vec<u8> {
    let mut out = lines.join("\n");
    out.push('\n');
    out.into_bytes()
}

pub(crate) struct FakeTransport {
    responses: Mutex<VecDeque<FakeResponse>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub(crate) fn new(responses: Vec<FakeResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = {
            self.requests.lock().expect("requests lock").push(request);
            self.responses.lock().expect("responses lock").pop_front()
        };
        match response {
            Some(FakeResponse::Body {
                status,
                chunks,
                stall,
            }) => {
                let body: ByteStream = if stall {
                    Box::pin(stream::iter(chunks).chain(stream::pending()))
                } else {
                    Box::pin(stream::iter(chunks))
                };
                Ok(TransportResponse {
                    status,
                    body: Some(body),
                })
            }
            Some(FakeResponse::Empty { status }) => Ok(TransportResponse { status, body: None }),
            Some(FakeResponse::Fail(err)) => Err(err),
            Some(FakeResponse::Hang) => futures::future::pending().await,
            None => Err(TransportError::new("no scripted response left")),
        }
    }
}

/// Client wired to `fake` with key `test-key` and base URL `http://fake.test`.
pub(crate) fn test_client(fake: Arc<FakeTransport>) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_url("http://fake.test")
        .transport(fake)
        .build()
        .expect("test client")
}
