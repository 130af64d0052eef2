use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream::{self, FusedStream, Stream};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::Client;
use crate::content::GenerationOutput;
use crate::decoder::decode_json_lines;
use crate::errors::{GenerationError, TransportError, generation_error_from_transport};
use crate::model::{ModelId, SessionId};
use crate::protocol::{Classified, Record, classify};
use crate::request::GenerationRequest;
use crate::stream::{Billing, GenerationEvent};
use crate::transport::{ByteStream, Transport, TransportRequest};

const ERROR_BODY_LIMIT: usize = 2048;

type EventStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GenerationError>> + Send + 'static>>;
type JsonLines = Pin<Box<dyn Stream<Item = Result<Value, TransportError>> + Send + 'static>>;

/// Handle used to cancel a running generation.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Idempotent. Has no effect once the generation produced its terminal
    /// element; otherwise the stream ends with `GenerationError::Cancelled`.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once `abort` has been called.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Builder for configuring and starting a single generation.
pub struct GenerationBuilder {
    client: Client,
    request: GenerationRequest,
    session_tracker: Option<Arc<watch::Sender<Option<SessionId>>>>,
}

impl GenerationBuilder {
    pub(crate) fn new(client: Client, request: GenerationRequest) -> Self {
        Self {
            client,
            request,
            session_tracker: None,
        }
    }

    pub(crate) fn track_session(mut self, tracker: Arc<watch::Sender<Option<SessionId>>>) -> Self {
        self.session_tracker = Some(tracker);
        self
    }

    /// Attaches a base64-encoded image.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.request = self.request.image(image);
        self
    }

    /// Sets the conversation role (`user` by default).
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.request = self.request.role(role);
        self
    }

    /// Sets the token budget.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.request = self.request.max_tokens(max_tokens);
        self
    }

    /// Sets the generation deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.timeout(timeout);
        self
    }

    /// Resumes an existing server session.
    pub fn session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.request = self.request.session_id(session_id);
        self
    }

    /// Selects the model for a new session.
    pub fn model_id(mut self, model_id: impl Into<ModelId>) -> Self {
        self.request = self.request.model_id(model_id);
        self
    }

    /// Returns the request built so far.
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Starts the generation and returns its event stream.
    ///
    /// Nothing is sent until the stream is first polled.
    pub fn stream(self) -> GenerationStream {
        let stream = self.client.generate(self.request);
        match self.session_tracker {
            Some(tracker) => stream.with_session_tracker(tracker),
            None => stream,
        }
    }

    /// Runs to completion and returns the aggregated output.
    pub async fn collect(self) -> Result<GenerationOutput, GenerationError> {
        self.stream().collect_output().await
    }

    /// Runs to completion and returns the concatenated text.
    pub async fn collect_text(self) -> Result<String, GenerationError> {
        Ok(self.collect().await?.text())
    }
}

/// Lazy stream of generation events.
///
/// Yields `Session` and `Data` events, then exactly one terminal element:
/// either `Ok(GenerationEvent::Billing { .. })` or `Err(GenerationError)`.
/// The stream ends right after it. Dropping the stream releases the
/// connection and disarms the deadline.
pub struct GenerationStream {
    request_id: uuid::Uuid,
    inner: EventStream,
    abort_handle: AbortHandle,
    session_id: Option<SessionId>,
    session_tracker: Option<Arc<watch::Sender<Option<SessionId>>>>,
    outcome: Option<Result<Billing, GenerationError>>,
}

impl GenerationStream {
    pub(crate) fn start(
        transport: Arc<dyn Transport>,
        request: TransportRequest,
        timeout: Duration,
    ) -> Self {
        let request_id = uuid::Uuid::new_v4();
        let (abort_tx, abort_rx) = watch::channel(false);
        let driver = Driver {
            request_id,
            transport,
            phase: Phase::Connect(request),
            timeout,
            deadline: None,
            abort_rx,
        };
        let inner = stream::unfold(driver, |mut driver| async move {
            let item = driver.next_item().await?;
            Some((item, driver))
        });
        Self::from_parts(request_id, Box::pin(inner), abort_tx)
    }

    pub(crate) fn rejected(error: GenerationError) -> Self {
        let (abort_tx, _) = watch::channel(false);
        let inner = stream::once(async move { Err(error) });
        Self::from_parts(uuid::Uuid::new_v4(), Box::pin(inner), abort_tx)
    }

    fn from_parts(request_id: uuid::Uuid, inner: EventStream, abort_tx: watch::Sender<bool>) -> Self {
        Self {
            request_id,
            inner,
            abort_handle: AbortHandle {
                tx: Arc::new(abort_tx),
            },
            session_id: None,
            session_tracker: None,
            outcome: None,
        }
    }

    pub(crate) fn with_session_tracker(
        mut self,
        tracker: Arc<watch::Sender<Option<SessionId>>>,
    ) -> Self {
        self.session_tracker = Some(tracker);
        self
    }

    /// Returns the client-side id of this generation (used in log fields).
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Returns the last session id announced by the server.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Returns a handle that can cancel the generation.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Drains the stream (if needed) and returns the terminal outcome.
    ///
    /// Safe to call after consuming events manually.
    pub async fn finish(mut self) -> Result<Billing, GenerationError> {
        while self.next().await.is_some() {}
        self.outcome.unwrap_or(Err(GenerationError::StreamEnded))
    }

    /// Drains the stream and aggregates every remaining event.
    ///
    /// Events already taken off the stream are not repeated in the output, but
    /// a terminal outcome that was already observed is still reported.
    pub async fn collect_output(mut self) -> Result<GenerationOutput, GenerationError> {
        let mut output = GenerationOutput {
            session_id: self.session_id.clone(),
            ..Default::default()
        };
        while let Some(item) = self.next().await {
            match item? {
                GenerationEvent::Session { session_id } => output.session_id = Some(session_id),
                GenerationEvent::Data {
                    delta,
                    step,
                    tokens,
                } => {
                    output.text_parts.extend(delta.text);
                    output.images.extend(delta.image);
                    output.last_step = step;
                    output.tokens = tokens;
                }
                GenerationEvent::Billing { cost, cost_per_mtk } => {
                    output.billing = Billing { cost, cost_per_mtk };
                    return Ok(output);
                }
            }
        }
        match self.outcome {
            Some(Ok(billing)) => {
                output.billing = billing;
                Ok(output)
            }
            Some(Err(err)) => Err(err),
            None => Err(GenerationError::StreamEnded),
        }
    }

    fn observe(&mut self, item: &Result<GenerationEvent, GenerationError>) {
        match item {
            Ok(GenerationEvent::Session { session_id }) => {
                self.session_id = Some(session_id.clone());
                if let Some(tracker) = &self.session_tracker {
                    tracker.send_replace(Some(session_id.clone()));
                }
            }
            Ok(GenerationEvent::Billing { cost, cost_per_mtk }) => {
                self.outcome = Some(Ok(Billing {
                    cost: *cost,
                    cost_per_mtk: *cost_per_mtk,
                }));
            }
            Ok(GenerationEvent::Data { .. }) => {}
            Err(err) => self.outcome = Some(Err(err.clone())),
        }
    }
}

impl Stream for GenerationStream {
    type Item = Result<GenerationEvent, GenerationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome.is_some() {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.observe(&item);
                if this.outcome.is_some() {
                    // Terminal element: release the connection now.
                    this.inner = Box::pin(stream::empty());
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.outcome = Some(Err(GenerationError::StreamEnded));
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedStream for GenerationStream {
    fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }
}

enum Phase {
    Connect(TransportRequest),
    Stream(JsonLines),
    Done,
}

/// State machine behind a `GenerationStream`.
struct Driver {
    request_id: uuid::Uuid,
    transport: Arc<dyn Transport>,
    phase: Phase,
    timeout: Duration,
    deadline: Option<Instant>,
    abort_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn next_item(&mut self) -> Option<Result<GenerationEvent, GenerationError>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::Connect(request) => match self.connect(request).await {
                    Ok(lines) => self.phase = Phase::Stream(lines),
                    Err(err) => return Some(Err(self.fail(err))),
                },
                Phase::Stream(mut lines) => match self.next_record(&mut lines).await {
                    Ok(Some(Classified::Emit(event))) => {
                        self.phase = Phase::Stream(lines);
                        return Some(Ok(event));
                    }
                    Ok(Some(Classified::Skip)) => self.phase = Phase::Stream(lines),
                    Ok(Some(Classified::Finish(event))) => {
                        debug!(request_id = %self.request_id, ?event, "generation completed");
                        return Some(Ok(event));
                    }
                    Ok(Some(Classified::Fail(message))) => {
                        return Some(Err(self.fail(GenerationError::Protocol { message })));
                    }
                    Ok(None) => return Some(Err(self.fail(GenerationError::StreamEnded))),
                    Err(err) => return Some(Err(self.fail(err))),
                },
            }
        }
    }

    fn deadline(&mut self) -> Instant {
        let timeout = self.timeout;
        *self.deadline.get_or_insert_with(|| {
            let now = Instant::now();
            // Far-future fallback for durations that overflow the clock.
            now.checked_add(timeout)
                .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
        })
    }

    async fn connect(&mut self, request: TransportRequest) -> Result<JsonLines, GenerationError> {
        let deadline = self.deadline();
        let timeout = self.timeout;
        debug!(
            request_id = %self.request_id,
            url = %request.url,
            timeout_secs = timeout.as_secs_f64(),
            "sending generation request"
        );

        let response = tokio::select! {
            biased;
            _ = abort_requested(&mut self.abort_rx) => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(GenerationError::Timeout(timeout)),
            result = self.transport.send(request) => {
                result.map_err(|err| generation_error_from_transport(err, timeout))?
            }
        };

        let status = response.status;
        if !response.is_success() {
            let excerpt = tokio::time::timeout_at(deadline, error_body_excerpt(response.body))
                .await
                .unwrap_or_default();
            return Err(GenerationError::transport(
                format!("generation request failed with status {status}: {excerpt}"),
                Some(status),
            ));
        }
        let no_body = || GenerationError::transport("response has no body to stream", Some(status));
        let Some(mut body) = response.body else {
            return Err(no_body());
        };

        // A chunked body can still be empty; wait for the first bytes.
        let first = loop {
            let chunk = tokio::select! {
                biased;
                _ = abort_requested(&mut self.abort_rx) => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(GenerationError::Timeout(timeout)),
                chunk = body.next() => chunk,
            };
            match chunk {
                None => return Err(no_body()),
                Some(Err(err)) => return Err(generation_error_from_transport(err, timeout)),
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
            }
        };
        let body: ByteStream = Box::pin(stream::once(async move { Ok(first) }).chain(body));
        Ok(Box::pin(decode_json_lines(body)))
    }

    async fn next_record(
        &mut self,
        lines: &mut JsonLines,
    ) -> Result<Option<Classified>, GenerationError> {
        let deadline = self.deadline();
        let timeout = self.timeout;
        let next = tokio::select! {
            biased;
            _ = abort_requested(&mut self.abort_rx) => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(GenerationError::Timeout(timeout)),
            next = lines.next() => next,
        };

        let value = match next {
            None => return Ok(None),
            Some(Err(err)) => return Err(generation_error_from_transport(err, timeout)),
            Some(Ok(value)) => value,
        };
        match Record::from_value(value) {
            Ok(record) => {
                if let Record::Unknown { .. } = record {
                    debug!(request_id = %self.request_id, status = record.status(), "ignoring record with unknown status");
                } else if let Record::Generating {
                    session, step, tokens, ..
                } = &record
                {
                    debug!(request_id = %self.request_id, session = %session, step, tokens, "generation step");
                }
                Ok(Some(classify(record)))
            }
            Err(err) => {
                warn!(request_id = %self.request_id, error = %err, "dropping record that does not match its status schema");
                Ok(Some(Classified::Skip))
            }
        }
    }

    fn fail(&self, err: GenerationError) -> GenerationError {
        warn!(request_id = %self.request_id, error = %err, "generation terminated");
        err
    }
}

/// Resolves once the abort flag is set. Never resolves if every handle is gone.
async fn abort_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let aborted = *rx.borrow_and_update();
        if aborted {
            return;
        }
        if rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

async fn error_body_excerpt(body: Option<ByteStream>) -> String {
    let Some(mut body) = body else {
        return String::new();
    };
    let mut buf = Vec::new();
    while buf.len() < ERROR_BODY_LIMIT {
        match body.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            _ => break,
        }
    }
    buf.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&buf).trim().to_string()
}
