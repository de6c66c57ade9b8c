pub mod pipeline;
pub mod config;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod producer;
pub mod upload;
pub mod staging;
pub mod cycle;
pub mod timestamp;
pub mod observability;
pub mod metrics_server;

pub use cycle::{CycleController, CycleSettings};
pub use pipeline::{Envelope, Pipeline};
pub use producer::BatchProducer;
