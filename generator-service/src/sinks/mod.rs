pub mod batch_file;

pub use batch_file::{BatchFileSink, BatchReport};
