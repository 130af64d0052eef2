//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, Billing, Client, ClientBuilder, ClientConfig, ClientError, Delta,
    GenerationBuilder, GenerationError, GenerationEvent, GenerationOutput, GenerationRequest,
    GenerationStream, ModelId, Session, SessionId,
};
