use serde::{Deserialize, Serialize};

use super::FaultStatus;

/// One telemetry snapshot from a single inverter.
///
/// Every measurement is optional; `None` means the sensor did not report and is
/// written as `null` in batch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterRecord {
    pub id: String,
    #[serde(rename = "PAC")]
    pub pac: Option<f64>,
    pub energy_output: Option<f64>,
    pub energy_conversion_efficiency: Option<f64>,
    pub performance_ratio: Option<f64>,
    pub system_uptime: Option<f64>,
    pub temperature: Option<f64>,
    pub fault_status: FaultStatus,
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,
    pub frequency: Option<f64>,
}

impl InverterRecord {
    pub fn inverter_id(n: usize) -> String {
        format!("Inverter_{n}")
    }
}
