// Module structure for the accuracy measurement driver.

// Inputs
pub mod config;
pub mod error;
pub mod filter;
pub mod store;

// Measurement
pub mod sampling;
pub mod harness;
pub mod pool;

pub mod runtime;

pub use config::{MeasureConfig, SampleFrom, TrainSampleMethod};
pub use error::{MeasureError, Result};
pub use filter::LineFilter;
pub use harness::{MeasureAccuracy, Summary, TrialResult};
pub use pool::TaskPool;
pub use store::MemoryLineStore;
