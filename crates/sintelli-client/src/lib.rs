//! Streaming client for the Sintelli generation API.
//!
//! A generation is a single HTTP POST whose response body is a stream of
//! newline-delimited JSON records. The client decodes the records as they
//! arrive and exposes them as a [`GenerationStream`] of [`GenerationEvent`]s
//! that ends with exactly one terminal element: the `Billing` event on
//! success, or a [`GenerationError`].
//!
//! # Streaming
//!
//! ```no_run
//! use futures::StreamExt as _;
//! use sintelli_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_env()?;
//! let mut stream = client
//!     .generation("Write a haiku about rivers")
//!     .model_id("sintelli/haiku@latest")
//!     .timeout(std::time::Duration::from_secs(30))
//!     .stream();
//!
//! while let Some(item) = stream.next().await {
//!     match item? {
//!         GenerationEvent::Session { session_id } => eprintln!("session {session_id}"),
//!         GenerationEvent::Data { delta, .. } => print!("{}", delta.text.unwrap_or_default()),
//!         GenerationEvent::Billing { cost, .. } => eprintln!("\ncost {cost}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Conversations
//!
//! ```no_run
//! use sintelli_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_env()?;
//! let session = client.session("sintelli/chat@latest");
//! let first = session.send("My name is Ada.").collect_text().await?;
//! let second = session.send("What is my name?").collect_text().await?;
//! println!("{first}\n{second}");
//! # Ok(())
//! # }
//! ```

mod client;
/// Client configuration and defaults.
pub mod config;
/// Content payloads and aggregated output.
pub mod content;
/// Incremental NDJSON decoding.
pub mod decoder;
/// Public error types.
pub mod errors;
mod generation;
/// Session and model identifiers.
pub mod model;
/// Tracing subscriber setup for binaries.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
mod protocol;
/// Generation request parameters and wire body.
pub mod request;
mod session;
/// Public stream events.
pub mod stream;
/// Transport seam and the default HTTP implementation.
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use content::{Delta, GenerationOutput};
pub use errors::{ClientError, GenerationError, PreconditionFailure, TransportError};
pub use generation::{AbortHandle, GenerationBuilder, GenerationStream};
pub use model::{ModelId, SessionId};
pub use request::GenerationRequest;
pub use session::Session;
pub use stream::{Billing, GenerationEvent};
