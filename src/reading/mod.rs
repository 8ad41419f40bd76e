pub mod status;

pub use status::{GlucoseStatus, MAX_PLAUSIBLE_MG_DL, MIN_PLAUSIBLE_MG_DL};

use serde::Serialize;

/// Unit of every reading produced by this service.
pub const UNIT_MG_DL: &str = "mg/dL";

/// Phrases the model returns when the display can't be read.
/// Compared case-insensitively as substrings.
const NOT_LEGIBLE_SENTINELS: [&str; 5] = [
    "non lisible",
    "illisible",
    "not legible",
    "unreadable",
    "not readable",
];

/// Structured interpretation of a meter photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    numeric_value: Option<u16>,
    status: GlucoseStatus,
    unit: &'static str,
    raw_response: String,
}

impl Reading {
    /// Normalize a free-text model reply into a reading.
    ///
    /// A reply matching a "not legible" sentinel, carrying no digits, or whose
    /// first digit run falls outside the plausible range yields a reading with
    /// no value and an `unknown` status. This never fails.
    pub fn from_model_reply(reply: &str) -> Self {
        let value = if is_not_legible(reply) {
            None
        } else {
            first_digit_run(reply)
                .and_then(|digits| digits.parse::<u16>().ok())
                .filter(|v| (MIN_PLAUSIBLE_MG_DL..=MAX_PLAUSIBLE_MG_DL).contains(v))
        };

        Self {
            numeric_value: value,
            status: value.map_or(GlucoseStatus::Unknown, GlucoseStatus::classify),
            unit: UNIT_MG_DL,
            raw_response: reply.to_string(),
        }
    }

    pub fn numeric_value(&self) -> Option<u16> {
        self.numeric_value
    }

    pub fn status(&self) -> GlucoseStatus {
        self.status
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }
}

fn is_not_legible(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    NOT_LEGIBLE_SENTINELS
        .iter()
        .any(|sentinel| lowered.contains(sentinel))
}

/// First contiguous run of ASCII digits, if any.
fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}
