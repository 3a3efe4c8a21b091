use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::http::error::TransportError;
use crate::http::types::Method;

/// 默认单请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 已完成变量替换、可以直接发出的请求
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: &str) -> Result<Self, TransportError> {
        let url = url::Url::parse(url)
            .map_err(|e| TransportError::invalid_request(format!("invalid URL '{}': {}", url, e)))?;

        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn insert_header(&mut self, key: &str, value: &str) -> Result<(), TransportError> {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            TransportError::invalid_request(format!("invalid header name '{}': {}", key, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::invalid_request(format!("invalid value for header '{}': {}", key, e))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, TransportError> {
        self.insert_header(key, value)?;
        Ok(self)
    }

    /// 序列化 JSON body；如果场景没有显式声明 Content-Type 则补上
    pub fn with_json(mut self, data: &Value) -> Result<Self, TransportError> {
        let json = serde_json::to_vec(data)
            .map_err(|e| TransportError::invalid_request(format!("invalid JSON body: {}", e)))?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.insert_header("Content-Type", "application/json")?;
        }
        self.body = Some(json);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
