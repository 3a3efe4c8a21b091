use crate::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 一个场景的请求部分，url / header / body 中都可以出现 `{name}` 占位符
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSpec {
    /// HTTP 方法，缺省为 GET
    #[serde(default)]
    pub method: Method,

    /// 绝对 URL，或相对于套件 `base_url` 的路径
    #[serde(alias = "path")]
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON 请求体
    #[serde(default, alias = "body", skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            json: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// 合并套件级默认 header；场景自己的 header 优先（名称大小写不敏感）
    pub fn with_default_headers(&self, defaults: &BTreeMap<String, String>) -> RequestSpec {
        let mut merged = self.clone();
        for (key, value) in defaults {
            let overridden = merged.headers.keys().any(|k| k.eq_ignore_ascii_case(key));
            if !overridden {
                merged.headers.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// 期望：状态码 + 可选 JSON schema + 变量捕获
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    pub status: u16,

    #[serde(default, alias = "json_schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// 变量名 → 提取路径（`$.a.b[0]` 或 header 名）
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub save: BTreeMap<String, String>,
}

impl Expectation {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            schema: None,
            save: BTreeMap::new(),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_save(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.save.insert(name.into(), path.into());
        self
    }
}

/// 一个命名的请求 / 期望对
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// 名称只用于展示，不要求唯一
    pub name: String,

    pub request: RequestSpec,

    pub expect: Expectation,

    /// 显式并行分组标签；相邻且标签相同的场景组成一个分组
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, request: RequestSpec, expect: Expectation) -> Self {
        Self {
            name: name.into(),
            request,
            expect,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// 一次运行的完整输入
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 相对 URL 的前缀，也可以包含占位符
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// 每个请求都带上的默认 header
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// 变量表的初始值
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,

    /// 按文档顺序排列的场景，文档顺序即依赖顺序
    #[serde(alias = "tests")]
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self {
            scenarios,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
