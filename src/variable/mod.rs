pub mod capture;
pub mod config;
pub mod resolver;
pub mod store;
pub mod types;

pub use capture::{CaptureSource, ExtractionError, Extractor, PathSegment, VariableCapture};
pub use config::ConfigLoader;
pub use resolver::{UnresolvedVariable, VariableResolver};
pub use store::VariableStore;
pub use types::{Environment, ProjectConfig, RunnerSettings};
