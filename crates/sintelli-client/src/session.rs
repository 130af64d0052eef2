use std::sync::Arc;

use tokio::sync::watch;

use crate::client::Client;
use crate::generation::GenerationBuilder;
use crate::model::{ModelId, SessionId};
use crate::request::GenerationRequest;

/// Multi-turn conversation with one model.
///
/// The first turn opens a server session; every `Session` event the server
/// announces is remembered and later turns resume that session. Clones share
/// the remembered id.
///
/// Turns are meant to run one after another. Turns started before the first
/// one announced its session each open a session of their own.
#[derive(Clone)]
pub struct Session {
    client: Client,
    model_id: ModelId,
    session_id: Arc<watch::Sender<Option<SessionId>>>,
}

impl Session {
    pub(crate) fn new(client: Client, model_id: ModelId, session_id: Option<SessionId>) -> Self {
        let (tx, _) = watch::channel(session_id);
        Self {
            client,
            model_id,
            session_id: Arc::new(tx),
        }
    }

    /// Model used when a new server session has to be opened.
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    /// Server session id announced so far, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.borrow().clone()
    }

    /// Subscribes to session id changes.
    pub fn watch_session_id(&self) -> watch::Receiver<Option<SessionId>> {
        self.session_id.subscribe()
    }

    /// Starts building the next turn of the conversation.
    pub fn send(&self, prompt: impl Into<String>) -> GenerationBuilder {
        let mut request = GenerationRequest::new(prompt).model_id(self.model_id.clone());
        if let Some(session_id) = self.session_id() {
            request = request.session_id(session_id);
        }
        GenerationBuilder::new(self.client.clone(), request).track_session(self.session_id.clone())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model_id", &self.model_id)
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}
