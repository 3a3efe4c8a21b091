use std::error::Error as _;
use std::fmt;

/// 传输层失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    /// 请求在发出前就无法构造（URL、header 非法等）
    InvalidRequest,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Dispatcher 返回的传输错误，不在这一层重试
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    /// 重试只对网络层失败有意义，构造失败重试也不会成功
    pub fn is_retryable(&self) -> bool {
        self.kind != TransportErrorKind::InvalidRequest
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // URL 单独记录在结果里，分类只看错误链本身
        let err = err.without_url();
        let chain = error_chain(&err);

        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else if err.is_connect() {
            classify_connect(&chain.to_lowercase())
        } else {
            TransportErrorKind::Other
        };

        Self::new(kind, chain)
    }
}

/// DNS 和 TLS 失败都发生在建立连接阶段
fn classify_connect(chain: &str) -> TransportErrorKind {
    if chain.contains("dns error") || chain.contains("failed to lookup address") {
        TransportErrorKind::Dns
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        TransportErrorKind::Tls
    } else {
        TransportErrorKind::Connect
    }
}

/// reqwest 的顶层错误信息很笼统，把 source 链拼起来
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
