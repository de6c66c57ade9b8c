pub mod simulated_inverter;

pub use simulated_inverter::SimulatedInverterSource;
