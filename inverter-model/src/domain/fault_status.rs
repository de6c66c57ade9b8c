use std::fmt;

use serde::{Deserialize, Serialize};

/// Fault condition reported alongside every inverter snapshot.
///
/// Serialized as the human-readable labels (`"Under Voltage"`, ...). Labels
/// outside the known set deserialize into `Unrecognized` so that files from
/// other producers can still be loaded and flagged by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultStatus {
    None,
    Overheat,
    UnderVoltage,
    OverVoltage,
    FrequencyError,
    SensorFailure,
    Unrecognized(String),
}

impl FaultStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Overheat => "Overheat",
            Self::UnderVoltage => "Under Voltage",
            Self::OverVoltage => "Over Voltage",
            Self::FrequencyError => "Frequency Error",
            Self::SensorFailure => "Sensor Failure",
            Self::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for FaultStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "None" => Self::None,
            "Overheat" => Self::Overheat,
            "Under Voltage" => Self::UnderVoltage,
            "Over Voltage" => Self::OverVoltage,
            "Frequency Error" => Self::FrequencyError,
            "Sensor Failure" => Self::SensorFailure,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<FaultStatus> for String {
    fn from(f: FaultStatus) -> Self {
        match f {
            FaultStatus::Unrecognized(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
