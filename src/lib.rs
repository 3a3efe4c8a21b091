pub mod assertion;
pub mod error;
pub mod http;
pub mod logger;
pub mod parser;
pub mod runner;
pub mod variable;

// Re-export commonly used types
pub use error::{ApiScenarioError, Result};
pub use parser::{Expectation, RequestSpec, Scenario, Suite, load_suite};
pub use runner::{RunConfig, StepResult, SuiteExecutor, SuiteReport};
pub use variable::VariableStore;
