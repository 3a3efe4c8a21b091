use reqwest::header::HeaderMap as Headers;
use serde_json::Value;
use std::time::Duration;

/// Dispatcher 返回的响应：原始字节 + 尽力解析的 JSON
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// body 不是合法 JSON 时为 None
    pub json: Option<Value>,
    pub duration: Duration,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>, duration: Duration) -> Self {
        let json = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        };

        Self {
            status,
            headers,
            body,
            json,
            duration,
        }
    }

    /// 构造 JSON 响应，主要用于 mock transport
    pub fn from_json(status: u16, value: &Value) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status, headers, body, Duration::ZERO)
    }

    /// 大小写不敏感的 header 查找
    pub fn header(&self, name: &str) -> Option<&reqwest::header::HeaderValue> {
        self.headers.get(name.to_ascii_lowercase().as_str())
    }
}
