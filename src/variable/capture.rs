use crate::http::HttpResponse;
use crate::variable::store::VariableStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// JSON 路径中的一段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// 变量捕获来源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// 从响应 Body 提取（JSONPath 风格）
    /// 示例: `$.token`, `$.items[0].id`, `$`
    Body(Vec<PathSegment>),

    /// 从响应 Header 提取，大小写不敏感；响应里没有这个 header 时
    /// 按 `$.<name>` 从 Body 提取
    /// 示例: `X-Request-Id`, `Location`, `id`
    Header(String),
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Body(segments) => write!(f, "{}", format_path(segments)),
            CaptureSource::Header(name) => write!(f, "{}", name),
        }
    }
}

/// 提取失败：只影响这一个变量，场景继续执行
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot extract '{variable}' from '{path}': {reason}")]
pub struct ExtractionError {
    pub variable: String,
    pub path: String,
    pub reason: String,
}

/// 变量捕获配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableCapture {
    /// 变量名称
    pub name: String,

    /// 捕获来源
    pub source: CaptureSource,
}

impl VariableCapture {
    /// 解析捕获源字符串
    ///
    /// 语法:
    /// - `$.token` → Body([Field("token")])
    /// - `$.users[0].id` → Body([Field("users"), Index(0), Field("id")])
    /// - `$['content-type']` → Body([Field("content-type")])
    /// - `X-Trace-Id` → Header("X-Trace-Id")，找不到时回退到 `$.X-Trace-Id`
    pub fn parse(var_name: &str, source_str: &str) -> Result<Self, ExtractionError> {
        let source_str = source_str.trim();
        let source = if source_str.starts_with('$') {
            let segments = parse_json_path(source_str).map_err(|reason| ExtractionError {
                variable: var_name.to_string(),
                path: source_str.to_string(),
                reason,
            })?;
            CaptureSource::Body(segments)
        } else {
            CaptureSource::Header(source_str.to_string())
        };

        Ok(Self {
            name: var_name.to_string(),
            source,
        })
    }

    /// 对响应执行提取
    pub fn capture(&self, response: &HttpResponse) -> Result<Value, ExtractionError> {
        let err = |reason: String| ExtractionError {
            variable: self.name.clone(),
            path: self.source.to_string(),
            reason,
        };

        match &self.source {
            CaptureSource::Header(name) => match response.header(name) {
                Some(value) => {
                    let text = value
                        .to_str()
                        .map_err(|e| err(format!("header value is not valid text: {}", e)))?;
                    Ok(Value::String(text.to_string()))
                }
                None => body_field(response, name)
                    .map_err(|reason| err(format!("header '{}' not found; {}", name, reason))),
            },
            CaptureSource::Body(segments) => {
                let body = response
                    .json
                    .as_ref()
                    .ok_or_else(|| err("response body is not valid JSON".to_string()))?;
                lookup(body, segments).cloned().map_err(err)
            }
        }
    }
}

/// 根据 `save` 映射从响应中提取变量写入 `store`
///
/// 只写入 `save` 中列出的变量；提取失败的变量从 `store` 中移除，错误逐个返回。
pub struct Extractor;

impl Extractor {
    pub fn extract(
        save: &BTreeMap<String, String>,
        response: &HttpResponse,
        store: &mut VariableStore,
    ) -> Vec<ExtractionError> {
        let mut errors = Vec::new();

        for (name, path) in save {
            let result = VariableCapture::parse(name, path).and_then(|c| c.capture(response));
            match result {
                Ok(value) => {
                    debug!(variable = %name, path = %path, "captured variable");
                    store.set(name.clone(), value);
                }
                Err(e) => {
                    warn!("{}", e);
                    store.remove(name);
                    errors.push(e);
                }
            }
        }

        errors
    }
}

/// 不带 `$` 的名称回退为 Body 路径
fn body_field(response: &HttpResponse, name: &str) -> Result<Value, String> {
    let segments = parse_json_path(&format!("$.{}", name))?;
    let body = response
        .json
        .as_ref()
        .ok_or_else(|| "response body is not valid JSON".to_string())?;
    lookup(body, &segments).cloned()
}

fn parse_json_path(raw: &str) -> Result<Vec<PathSegment>, String> {
    let mut segments = Vec::new();
    let mut rest = &raw[1..];

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after
                .find(|c: char| c == '.' || c == '[')
                .unwrap_or(after.len());
            let field = &after[..end];
            if field.is_empty() {
                return Err(format!("empty field name in path '{}'", raw));
            }
            segments.push(PathSegment::Field(field.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| format!("unclosed '[' in path '{}'", raw))?;
            let inner = after[..end].trim();
            segments.push(parse_bracket(inner).ok_or_else(|| {
                format!("invalid index '[{}]' in path '{}'", inner, raw)
            })?);
            rest = &after[end + 1..];
        } else {
            return Err(format!(
                "expected '.' or '[' after '{}' in path '{}'",
                &raw[..raw.len() - rest.len()],
                raw
            ));
        }
    }

    Ok(segments)
}

fn parse_bracket(inner: &str) -> Option<PathSegment> {
    if let Ok(index) = inner.parse::<usize>() {
        return Some(PathSegment::Index(index));
    }
    let quoted = (inner.starts_with('\'') && inner.ends_with('\''))
        || (inner.starts_with('"') && inner.ends_with('"'));
    if quoted && inner.len() >= 2 {
        return Some(PathSegment::Field(inner[1..inner.len() - 1].to_string()));
    }
    None
}

fn format_path(segments: &[PathSegment]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        match segment {
            PathSegment::Field(name) => {
                path.push('.');
                path.push_str(name);
            }
            PathSegment::Index(i) => path.push_str(&format!("[{}]", i)),
        }
    }
    path
}

fn lookup<'a>(root: &'a Value, segments: &[PathSegment]) -> Result<&'a Value, String> {
    let mut current = root;

    for (depth, segment) in segments.iter().enumerate() {
        let at = format_path(&segments[..depth]);
        current = match (segment, current) {
            (PathSegment::Field(name), Value::Object(map)) => map
                .get(name)
                .ok_or_else(|| format!("field '{}' not found at {}", name, at))?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i).ok_or_else(|| {
                format!(
                    "index {} out of bounds at {} (length {})",
                    i,
                    at,
                    items.len()
                )
            })?,
            (PathSegment::Field(name), other) => {
                return Err(format!(
                    "cannot read field '{}' of {} at {}",
                    name,
                    json_type_name(other),
                    at
                ));
            }
            (PathSegment::Index(i), other) => {
                return Err(format!(
                    "cannot index [{}] into {} at {}",
                    i,
                    json_type_name(other),
                    at
                ));
            }
        };
    }

    Ok(current)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use std::time::Duration;

    fn response(body: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-request-id", "req-123".parse().unwrap());
        HttpResponse::new(200, headers, body.as_bytes().to_vec(), Duration::from_millis(5))
    }

    fn save(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_body_path() {
        let capture = VariableCapture::parse("id", "$.users[0].id").unwrap();
        assert_eq!(
            capture.source,
            CaptureSource::Body(vec![
                PathSegment::Field("users".to_string()),
                PathSegment::Index(0),
                PathSegment::Field("id".to_string()),
            ])
        );
        assert_eq!(capture.source.to_string(), "$.users[0].id");
    }

    #[test]
    fn test_parse_root_and_quoted() {
        let capture = VariableCapture::parse("all", "$").unwrap();
        assert_eq!(capture.source, CaptureSource::Body(vec![]));

        let capture = VariableCapture::parse("kind", "$['content-type'][2]").unwrap();
        assert_eq!(
            capture.source,
            CaptureSource::Body(vec![
                PathSegment::Field("content-type".to_string()),
                PathSegment::Index(2),
            ])
        );
    }

    #[test]
    fn test_parse_header() {
        let capture = VariableCapture::parse("trace_id", "X-Trace-Id").unwrap();
        assert_eq!(
            capture.source,
            CaptureSource::Header("X-Trace-Id".to_string())
        );
    }

    #[test]
    fn test_parse_invalid_paths() {
        assert!(VariableCapture::parse("x", "$.").is_err());
        assert!(VariableCapture::parse("x", "$..a").is_err());
        assert!(VariableCapture::parse("x", "$.a[").is_err());
        assert!(VariableCapture::parse("x", "$.a[-1]").is_err());
        assert!(VariableCapture::parse("x", "$a").is_err());
    }

    #[test]
    fn test_extract_scalars_keep_type() {
        let resp = response(r#"{"id": 42, "name": "widget", "tags": ["a", "b"], "ok": true}"#);
        let mut store = VariableStore::new();
        let errors = Extractor::extract(
            &save(&[("id", "$.id"), ("name", "$.name"), ("second", "$.tags[1]"), ("ok", "$.ok")]),
            &resp,
            &mut store,
        );

        assert!(errors.is_empty());
        assert_eq!(store.get("id"), Some(&json!(42)));
        assert_eq!(store.get("name"), Some(&json!("widget")));
        assert_eq!(store.get("second"), Some(&json!("b")));
        assert_eq!(store.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let resp = response("{}");
        let mut store = VariableStore::new();
        let errors = Extractor::extract(&save(&[("rid", "X-REQUEST-ID")]), &resp, &mut store);

        assert!(errors.is_empty());
        assert_eq!(store.render("rid").as_deref(), Some("req-123"));
    }

    #[test]
    fn test_bare_name_falls_back_to_body() {
        let resp = response(r#"{"id": 7, "user": {"name": "amy"}}"#);
        let mut store = VariableStore::new();
        let errors = Extractor::extract(
            &save(&[("id", "id"), ("user_name", "user.name"), ("rid", "x-request-id")]),
            &resp,
            &mut store,
        );

        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(store.get("id"), Some(&json!(7)));
        assert_eq!(store.get("user_name"), Some(&json!("amy")));
        assert_eq!(store.get("rid"), Some(&json!("req-123")));
    }

    #[test]
    fn test_header_takes_precedence_over_body_field() {
        let resp = response(r#"{"x-request-id": "from-body"}"#);
        let capture = VariableCapture::parse("rid", "X-Request-Id").unwrap();
        assert_eq!(capture.capture(&resp).unwrap(), json!("req-123"));
    }

    #[test]
    fn test_failed_extraction_clears_previous_value() {
        let resp = response(r#"{"items": []}"#);
        let mut store = VariableStore::new();
        store.set("first", 1);

        let errors = Extractor::extract(&save(&[("first", "$.items[0]")]), &resp, &mut store);
        assert_eq!(errors.len(), 1);
        assert!(!store.contains("first"));
    }

    #[test]
    fn test_missing_path_leaves_variable_unset() {
        let resp = response(r#"{"user": {"id": 1}}"#);
        let mut store = VariableStore::new();
        let errors = Extractor::extract(
            &save(&[("email", "$.user.email"), ("id", "$.user.id")]),
            &resp,
            &mut store,
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].variable, "email");
        assert_eq!(errors[0].reason, "field 'email' not found at $.user");
        assert!(!store.contains("email"));
        assert_eq!(store.get("id"), Some(&json!(1)));
    }

    #[test]
    fn test_extract_errors() {
        let resp = response(r#"{"items": [1], "name": "x"}"#);

        let capture = VariableCapture::parse("v", "$.items[3]").unwrap();
        let err = capture.capture(&resp).unwrap_err();
        assert_eq!(err.reason, "index 3 out of bounds at $.items (length 1)");

        let capture = VariableCapture::parse("v", "$.name.first").unwrap();
        let err = capture.capture(&resp).unwrap_err();
        assert_eq!(err.reason, "cannot read field 'first' of string at $.name");

        let capture = VariableCapture::parse("v", "X-Missing").unwrap();
        let err = capture.capture(&resp).unwrap_err();
        assert_eq!(
            err.reason,
            "header 'X-Missing' not found; field 'X-Missing' not found at $"
        );

        let capture = VariableCapture::parse("v", "$.id").unwrap();
        let err = capture.capture(&response("not json")).unwrap_err();
        assert_eq!(err.reason, "response body is not valid JSON");
        assert_eq!(
            err.to_string(),
            "cannot extract 'v' from '$.id': response body is not valid JSON"
        );
    }

    #[test]
    fn test_extract_does_not_touch_other_variables() {
        let resp = response(r#"{"id": 9}"#);
        let mut store = VariableStore::new();
        store.set("keep", "me");
        store.set("id", 1);

        Extractor::extract(&save(&[("id", "$.id")]), &resp, &mut store);
        assert_eq!(store.render("keep").as_deref(), Some("me"));
        assert_eq!(store.get("id"), Some(&json!(9)));
    }
}
