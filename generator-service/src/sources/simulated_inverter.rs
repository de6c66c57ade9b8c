use std::pin::Pin;

use futures::Stream;
use inverter_model::domain::{FaultStatus, InverterRecord};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::pipeline::{Envelope, PipelineError, Source};

/// Probability that any single reading is dropped.
pub const DEFAULT_SENSOR_FAILURE_RATE: f64 = 0.01;

// Generation windows are deliberately a little wider than the validation
// windows so that some generated records are rejected.
const PAC: (f64, f64) = (1000.0, 5000.0);
const ENERGY_OUTPUT: (f64, f64) = (10000.0, 20000.0);
const ENERGY_CONVERSION_EFFICIENCY: (f64, f64) = (90.0, 100.0);
const PERFORMANCE_RATIO: (f64, f64) = (0.7, 0.96);
const SYSTEM_UPTIME: (f64, f64) = (98.0, 100.0);
const TEMPERATURE: (f64, f64) = (30.0, 56.0);
const INPUT_VOLTAGE: (f64, f64) = (515.0, 700.0);
const OUTPUT_VOLTAGE: (f64, f64) = (220.0, 241.0);
const FREQUENCY: (f64, f64) = (49.0, 51.0);

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn reading<R: Rng>(rng: &mut R, (lo, hi): (f64, f64), failure_rate: f64) -> Option<f64> {
    let value = round2(rng.gen_range(lo..=hi));
    if rng.gen_bool(failure_rate) {
        None
    } else {
        Some(value)
    }
}

/// Fault classification from the three key readings, first match wins.
pub fn derive_fault_status(
    temperature: Option<f64>,
    input_voltage: Option<f64>,
    frequency: Option<f64>,
) -> FaultStatus {
    let (Some(temp), Some(volts), Some(freq)) = (temperature, input_voltage, frequency) else {
        return FaultStatus::SensorFailure;
    };

    if temp > 55.0 {
        FaultStatus::Overheat
    } else if volts < 520.0 {
        FaultStatus::UnderVoltage
    } else if volts > 680.0 {
        FaultStatus::OverVoltage
    } else if !(49.5..=50.5).contains(&freq) {
        FaultStatus::FrequencyError
    } else {
        FaultStatus::None
    }
}

/// Produce one synthetic snapshot for inverter `n`.
///
/// `failure_rate` must be within `0.0..=1.0`.
pub fn generate_inverter_record<R: Rng>(
    n: usize,
    failure_rate: f64,
    rng: &mut R,
) -> InverterRecord {
    let temperature = reading(rng, TEMPERATURE, failure_rate);
    let input_voltage = reading(rng, INPUT_VOLTAGE, failure_rate);
    let frequency = reading(rng, FREQUENCY, failure_rate);
    let fault_status = derive_fault_status(temperature, input_voltage, frequency);

    InverterRecord {
        id: InverterRecord::inverter_id(n),
        pac: reading(rng, PAC, failure_rate),
        energy_output: reading(rng, ENERGY_OUTPUT, failure_rate),
        energy_conversion_efficiency: reading(rng, ENERGY_CONVERSION_EFFICIENCY, failure_rate),
        performance_ratio: reading(rng, PERFORMANCE_RATIO, failure_rate),
        system_uptime: reading(rng, SYSTEM_UPTIME, failure_rate),
        temperature,
        fault_status,
        input_voltage,
        output_voltage: reading(rng, OUTPUT_VOLTAGE, failure_rate),
        frequency,
    }
}

/// Source yielding `count` simulated inverters, `Inverter_1..=Inverter_<count>`.
pub struct SimulatedInverterSource {
    count: usize,
    failure_rate: f64,
    seed: Option<u64>,
}

impl SimulatedInverterSource {
    /// Rates outside `0.0..=1.0` are clamped; NaN and infinities fall back to
    /// `DEFAULT_SENSOR_FAILURE_RATE`.
    pub fn new(count: usize, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            DEFAULT_SENSOR_FAILURE_RATE
        };
        Self {
            count,
            failure_rate,
            seed: None,
        }
    }

    /// Fix the RNG seed so the generated stream is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[async_trait::async_trait]
impl Source<InverterRecord> for SimulatedInverterSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<InverterRecord>, PipelineError>> + Send>> {
        let count = self.count;
        let failure_rate = self.failure_rate;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let s = async_stream::stream! {
            for n in 1..=count {
                let record = generate_inverter_record(n, failure_rate, &mut rng);
                metrics::counter!("generator_records_generated_total").increment(1);
                yield Ok::<_, PipelineError>(Envelope::new(record));
            }
        };

        Box::pin(s)
    }
}
