//! Typed view of the records carried by the response stream.

use serde::Deserialize;
use serde_json::Value;

use crate::content::Delta;
use crate::model::SessionId;
use crate::stream::GenerationEvent;

/// One record of the response stream, discriminated by its `status` field.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Record {
    Initialized { session_id: SessionId },
    Resumed { session_id: SessionId },
    Generating {
        session: String,
        delta: Delta,
        step: u64,
        tokens: u64,
    },
    Completed { cost: f64, cost_per_mtk: f64 },
    Error { message: String },
    /// A status this client does not know (or no status at all).
    Unknown { status: Option<String> },
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum KnownRecord {
    Initialized {
        session_id: SessionId,
    },
    Resumed {
        session_id: SessionId,
    },
    Generating {
        #[serde(default)]
        session: String,
        #[serde(default)]
        delta: Delta,
        step: u64,
        tokens: u64,
    },
    Completed {
        #[serde(deserialize_with = "non_negative_amount")]
        cost: f64,
        #[serde(deserialize_with = "non_negative_amount")]
        cost_per_mtk: f64,
    },
    Error {
        message: String,
    },
}

fn non_negative_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let amount = f64::deserialize(deserializer)?;
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(serde::de::Error::custom(format_args!(
            "expected a non-negative amount, got {amount}"
        )))
    }
}

const KNOWN_STATUSES: [&str; 5] = ["initialized", "resumed", "generating", "completed", "error"];

impl Record {
    /// Decodes a JSON value into a record.
    ///
    /// Unknown statuses decode to [`Record::Unknown`]; a known status with
    /// fields that do not match its schema is an error.
    pub(crate) fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        match status {
            Some(status) if KNOWN_STATUSES.contains(&status.as_str()) => {
                Ok(serde_json::from_value::<KnownRecord>(value)?.into())
            }
            status => Ok(Record::Unknown { status }),
        }
    }

    pub(crate) fn status(&self) -> &str {
        match self {
            Record::Initialized { .. } => "initialized",
            Record::Resumed { .. } => "resumed",
            Record::Generating { .. } => "generating",
            Record::Completed { .. } => "completed",
            Record::Error { .. } => "error",
            Record::Unknown { status } => status.as_deref().unwrap_or("<missing>"),
        }
    }
}

impl From<KnownRecord> for Record {
    fn from(value: KnownRecord) -> Self {
        match value {
            KnownRecord::Initialized { session_id } => Record::Initialized { session_id },
            KnownRecord::Resumed { session_id } => Record::Resumed { session_id },
            KnownRecord::Generating {
                session,
                delta,
                step,
                tokens,
            } => Record::Generating {
                session,
                delta,
                step,
                tokens,
            },
            KnownRecord::Completed { cost, cost_per_mtk } => {
                Record::Completed { cost, cost_per_mtk }
            }
            KnownRecord::Error { message } => Record::Error { message },
        }
    }
}

/// What the driver does with a decoded record.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Classified {
    /// Yield the event and keep reading.
    Emit(GenerationEvent),
    /// Yield the event and stop; this is the end-of-generation signal.
    Finish(GenerationEvent),
    /// Stop with the server's error message.
    Fail(String),
    /// Ignore the record.
    Skip,
}

pub(crate) fn classify(record: Record) -> Classified {
    match record {
        Record::Error { message } => Classified::Fail(message),
        Record::Initialized { session_id } | Record::Resumed { session_id } => {
            Classified::Emit(GenerationEvent::Session { session_id })
        }
        Record::Generating {
            delta,
            step,
            tokens,
            ..
        } => Classified::Emit(GenerationEvent::Data {
            delta,
            step,
            tokens,
        }),
        Record::Completed { cost, cost_per_mtk } => {
            Classified::Finish(GenerationEvent::Billing { cost, cost_per_mtk })
        }
        Record::Unknown { .. } => Classified::Skip,
    }
}
