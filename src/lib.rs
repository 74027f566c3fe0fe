pub mod compute;
pub mod config;
pub mod core;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod loader;
pub mod observability;

pub use config::EngineConfig;
pub use dataset::{Dataset, DatasetSources, FeatureSource};
pub use engine::{ComputeChannel, RequestArbiter, RequestKey, SlotOutcome};
pub use error::{PipelineError, Result};
pub use loader::FormatLoader;
