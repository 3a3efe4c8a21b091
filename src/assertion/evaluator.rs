use crate::assertion::schema::validate_schema;
use crate::assertion::types::{AssertionFailure, SchemaViolation};
use crate::http::HttpResponse;
use crate::parser::Expectation;
use serde_json::Value;

/// 对响应执行期望校验，返回全部失败（为空即通过）
///
/// 状态码和 schema 的失败都会收集，不会短路。
pub fn evaluate_expectation(expect: &Expectation, response: &HttpResponse) -> Vec<AssertionFailure> {
    let mut failures = Vec::new();

    if let Some(failure) = check_status(expect.status, response.status) {
        failures.push(failure);
    }

    if let Some(schema) = &expect.schema {
        failures.extend(check_schema(schema, response.json.as_ref()));
    }

    failures
}

/// 精确匹配，不支持范围
pub fn check_status(expected: u16, actual: u16) -> Option<AssertionFailure> {
    (expected != actual).then_some(AssertionFailure::StatusMismatch { expected, actual })
}

pub fn check_schema(schema: &Value, body: Option<&Value>) -> Vec<AssertionFailure> {
    let Some(body) = body else {
        return vec![AssertionFailure::Schema(SchemaViolation {
            path: "$".to_string(),
            message: "response body is not valid JSON".to_string(),
        })];
    };

    validate_schema(schema, body)
        .into_iter()
        .map(AssertionFailure::Schema)
        .collect()
}
