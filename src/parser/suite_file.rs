use crate::parser::types::{Scenario, Suite};
use crate::{ApiScenarioError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 套件文件解析器（YAML / JSON）
///
/// 文档可以是场景列表，也可以是带 `base_url`、`headers`、`variables`、
/// `scenarios` 的映射。
pub struct SuiteLoader;

impl SuiteLoader {
    /// 按扩展名选择格式：`.json` 用 JSON，其它一律按 YAML 解析
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Suite> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut suite = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };

        // 没有名称时用文件名
        if suite.name.is_none() {
            suite.name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.to_string());
        }

        debug!(
            "Loaded {} scenarios from {}",
            suite.scenarios.len(),
            path.display()
        );
        Ok(suite)
    }

    pub fn from_yaml_str(content: &str) -> Result<Suite> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let suite = if value.is_sequence() {
            Suite::new(serde_yaml::from_value::<Vec<Scenario>>(value)?)
        } else {
            serde_yaml::from_value(value)?
        };
        Self::ensure_not_empty(suite)
    }

    pub fn from_json_str(content: &str) -> Result<Suite> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let suite = if value.is_array() {
            Suite::new(serde_json::from_value::<Vec<Scenario>>(value)?)
        } else {
            serde_json::from_value(value)?
        };
        Self::ensure_not_empty(suite)
    }

    fn ensure_not_empty(suite: Suite) -> Result<Suite> {
        if suite.is_empty() {
            return Err(ApiScenarioError::ParseError(
                "No scenarios found in suite".to_string(),
            ));
        }
        Ok(suite)
    }
}
