pub mod executor;
pub mod plan;
pub mod reporter;
pub mod scenario;
pub mod types;

pub use executor::{DEFAULT_MAX_WORKERS, RunConfig, SuiteExecutor};
pub use plan::{Batch, ExecutionPlan};
pub use reporter::{OutputFormat, TestReporter};
pub use scenario::{ScenarioRun, ScenarioRunner};
pub use types::{ScenarioState, StepResult, SuiteReport};
