use crate::model::SessionId;
use crate::stream::Billing;

/// Incremental content fragment of a generation step.
///
/// Both fields may be absent at the same time; an empty delta is valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Delta {
    /// Text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64-encoded image fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Delta {
    /// Returns `true` when the delta carries neither text nor image data.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none()
    }
}

/// Aggregated result of a generation that reached its `completed` record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOutput {
    /// Session announced by the server, if any.
    pub session_id: Option<SessionId>,
    /// Text fragments in arrival order.
    pub text_parts: Vec<String>,
    /// Image fragments in arrival order.
    pub images: Vec<String>,
    /// Step reported by the last `Data` event.
    pub last_step: u64,
    /// Token count reported by the last `Data` event.
    pub tokens: u64,
    /// Billing information from the terminal event.
    pub billing: Billing,
}

impl GenerationOutput {
    /// Concatenates all text fragments in order.
    pub fn text(&self) -> String {
        self.text_parts.concat()
    }
}
