use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::http::error::TransportError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;

/// 传输层接缝：给定已解析的请求，返回响应或传输错误
///
/// 每次调用恰好发出一次请求，不做重试。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// 基于 reqwest 的默认 transport
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("apiscenario/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "dispatching request");

        let mut req = self
            .inner
            .request(request.method.into(), request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let start = Instant::now();
        let response = req.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let duration = start.elapsed();

        Ok(HttpResponse::new(status, headers, body, duration))
    }
}
