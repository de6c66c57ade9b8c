use crate::pipeline::{Envelope, PipelineError, Transform};
use inverter_model::domain::InverterRecord;

/// Inclusive acceptance window for one numeric reading.
#[derive(Debug, Clone, Copy)]
pub struct SensorRange {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl SensorRange {
    const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
}

pub const PAC: SensorRange = SensorRange::new("PAC", 1000.0, 5000.0);
pub const ENERGY_OUTPUT: SensorRange = SensorRange::new("energy_output", 10000.0, 20000.0);
pub const ENERGY_CONVERSION_EFFICIENCY: SensorRange =
    SensorRange::new("energy_conversion_efficiency", 90.0, 99.0);
pub const PERFORMANCE_RATIO: SensorRange = SensorRange::new("performance_ratio", 0.7, 0.95);
pub const SYSTEM_UPTIME: SensorRange = SensorRange::new("system_uptime", 98.0, 100.0);
pub const TEMPERATURE: SensorRange = SensorRange::new("temperature", 30.0, 60.0);
pub const INPUT_VOLTAGE: SensorRange = SensorRange::new("input_voltage", 500.0, 700.0);
pub const OUTPUT_VOLTAGE: SensorRange = SensorRange::new("output_voltage", 220.0, 240.0);
pub const FREQUENCY: SensorRange = SensorRange::new("frequency", 49.0, 51.0);

fn check(range: &SensorRange, value: Option<f64>, errors: &mut Vec<String>) {
    match value {
        None => errors.push(format!("{} sensor failure", range.field)),
        Some(v) if !range.contains(v) => errors.push(format!(
            "{} out of range ({}-{})",
            range.field, range.min, range.max
        )),
        Some(_) => {}
    }
}

/// Pure validation of an `InverterRecord`.
///
/// Returns one message per problem, in field order; an empty vector means the
/// record is acceptable. A missing reading is reported as a sensor failure
/// rather than range-checked.
pub fn validate_inverter_record(r: &InverterRecord) -> Vec<String> {
    let mut errors = Vec::new();

    check(&PAC, r.pac, &mut errors);
    check(&ENERGY_OUTPUT, r.energy_output, &mut errors);
    check(&ENERGY_CONVERSION_EFFICIENCY, r.energy_conversion_efficiency, &mut errors);
    check(&PERFORMANCE_RATIO, r.performance_ratio, &mut errors);
    check(&SYSTEM_UPTIME, r.system_uptime, &mut errors);
    check(&TEMPERATURE, r.temperature, &mut errors);
    check(&INPUT_VOLTAGE, r.input_voltage, &mut errors);
    check(&OUTPUT_VOLTAGE, r.output_voltage, &mut errors);
    check(&FREQUENCY, r.frequency, &mut errors);

    // "Sensor Failure" is a legitimate status, so any recognized label passes.
    if !r.fault_status.is_recognized() {
        errors.push("fault_status not valid".to_string());
    }

    errors
}

#[derive(Clone, Default)]
pub struct InverterValidation;

#[async_trait::async_trait]
impl Transform<InverterRecord, InverterRecord> for InverterValidation {
    async fn apply(
        &self,
        input: Envelope<InverterRecord>,
    ) -> Result<Envelope<InverterRecord>, PipelineError> {
        let violations = validate_inverter_record(&input.payload);
        if violations.is_empty() {
            return Ok(input);
        }

        metrics::counter!("validation_inverter_rejected_total").increment(1);
        Err(PipelineError::Rejected {
            id: input.payload.id.clone(),
            record: Box::new(input.payload),
            violations,
        })
    }
}
