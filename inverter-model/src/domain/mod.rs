pub mod fault_status;
pub mod inverter_record;

pub use fault_status::FaultStatus;
pub use inverter_record::InverterRecord;
