/// 断言模块 - 状态码校验与 JSON schema 结构校验
mod evaluator;
mod schema;
mod types;

pub use evaluator::{check_schema, check_status, evaluate_expectation};
pub use schema::validate_schema;
pub use types::{AssertionFailure, SchemaType, SchemaViolation};
