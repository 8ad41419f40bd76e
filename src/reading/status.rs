use serde::Serialize;

/// Lowest value a meter display can plausibly show, in mg/dL.
pub const MIN_PLAUSIBLE_MG_DL: u16 = 20;

/// Highest value a meter display can plausibly show, in mg/dL.
pub const MAX_PLAUSIBLE_MG_DL: u16 = 600;

/// Upper bound (inclusive) of each band, in mg/dL.
const HYPO_MAX: u16 = 69;
const NORMAL_MAX: u16 = 126;
const HYPER_MAX: u16 = 200;

/// Clinical status band of a glucose reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseStatus {
    Hypo,
    Normal,
    Hyper,
    Severe,
    Unknown,
}

impl GlucoseStatus {
    /// Classify a value already known to be in the plausible range.
    pub fn classify(value: u16) -> Self {
        match value {
            ..=HYPO_MAX => GlucoseStatus::Hypo,
            ..=NORMAL_MAX => GlucoseStatus::Normal,
            ..=HYPER_MAX => GlucoseStatus::Hyper,
            _ => GlucoseStatus::Severe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GlucoseStatus::Hypo => "hypo",
            GlucoseStatus::Normal => "normal",
            GlucoseStatus::Hyper => "hyper",
            GlucoseStatus::Severe => "severe",
            GlucoseStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GlucoseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
