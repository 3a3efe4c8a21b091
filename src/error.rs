use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiScenarioError {
    #[error("parse error: {0}")]
    ParseError(String),

    /// 执行计划校验失败，套件不会开始执行
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("config file error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Result type for apiscenario crate
pub type Result<T> = std::result::Result<T, ApiScenarioError>;
