use crate::content::Delta;
use crate::model::SessionId;

/// Billing information carried by the terminal `completed` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Billing {
    /// Total cost of the generation.
    pub cost: f64,
    /// Cost per million tokens.
    pub cost_per_mtk: f64,
}

/// Events exposed by a [`GenerationStream`](crate::GenerationStream).
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
    /// The server opened (`initialized`) or resumed (`resumed`) a session.
    Session { session_id: SessionId },
    /// Incremental output of one generation step.
    Data { delta: Delta, step: u64, tokens: u64 },
    /// Terminal success event. Nothing follows it.
    Billing { cost: f64, cost_per_mtk: f64 },
}

impl GenerationEvent {
    /// Returns `true` for the terminal `Billing` event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Billing { .. })
    }

    /// Returns the text fragment of a `Data` event.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Data { delta, .. } => delta.text.as_deref(),
            _ => None,
        }
    }

    /// Returns the billing payload of a `Billing` event.
    pub fn as_billing(&self) -> Option<Billing> {
        match self {
            Self::Billing { cost, cost_per_mtk } => Some(Billing {
                cost: *cost,
                cost_per_mtk: *cost_per_mtk,
            }),
            _ => None,
        }
    }
}
