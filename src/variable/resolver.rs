use crate::parser::RequestSpec;
use crate::variable::store::VariableStore;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// 模板中引用了变量表里不存在的变量
///
/// `names` 按首次出现顺序去重。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unresolved variable: {}", .names.join(", "))]
pub struct UnresolvedVariable {
    pub names: Vec<String>,
}

impl UnresolvedVariable {
    /// 每个缺失变量一条失败原因
    pub fn reasons(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|name| format!("unresolved variable: {}", name))
            .collect()
    }
}

/// 占位符语法: `{name}`，兼容 `{{name}}`
fn token_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX.get_or_init(|| {
        Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}|\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap()
    })
}

fn token_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

fn record_missing(missing: &mut Vec<String>, name: &str) {
    if !missing.iter().any(|m| m == name) {
        missing.push(name.to_string());
    }
}

/// 变量替换器
///
/// 两阶段：正则切出占位符，再到 [`VariableStore`] 查找。
/// 查不到的变量不会被替换成空串，而是汇总成 [`UnresolvedVariable`]。
pub struct VariableResolver;

impl VariableResolver {
    /// 文本中是否包含占位符
    pub fn has_placeholders(text: &str) -> bool {
        token_regex().is_match(text)
    }

    /// 文本恰好是一个完整占位符时返回变量名
    pub fn whole_token(text: &str) -> Option<&str> {
        let caps = token_regex().captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() == 0 && whole.end() == text.len() {
            Some(token_name(&caps))
        } else {
            None
        }
    }

    /// 替换字符串中的所有占位符
    pub fn resolve_str(text: &str, store: &VariableStore) -> Result<String, UnresolvedVariable> {
        let mut missing = Vec::new();
        let resolved = Self::substitute(text, store, &mut missing);
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(UnresolvedVariable { names: missing })
        }
    }

    /// 对已解析的 JSON 结构逐字段替换
    ///
    /// 字段值恰好是一个占位符时，替换为变量的原生 JSON 值（数字仍是数字）；
    /// 部分插值退化为文本替换。
    pub fn resolve_json(value: &Value, store: &VariableStore) -> Result<Value, UnresolvedVariable> {
        let mut missing = Vec::new();
        let resolved = Self::substitute_json(value, store, &mut missing);
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(UnresolvedVariable { names: missing })
        }
    }

    /// 解析整个请求：URL、header 值和 JSON body
    ///
    /// 所有缺失变量一次性收集，保证请求发出之前就失败。
    pub fn resolve_request(
        spec: &RequestSpec,
        store: &VariableStore,
    ) -> Result<RequestSpec, UnresolvedVariable> {
        let mut missing = Vec::new();

        let url = Self::substitute(&spec.url, store, &mut missing);
        let headers = spec
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Self::substitute(v, store, &mut missing)))
            .collect();
        let json = spec
            .json
            .as_ref()
            .map(|body| Self::substitute_json(body, store, &mut missing));

        if !missing.is_empty() {
            return Err(UnresolvedVariable { names: missing });
        }

        Ok(RequestSpec {
            method: spec.method,
            url,
            headers,
            json,
        })
    }

    /// 解析并替换系统环境变量 ${VAR}，找不到的保持原样
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }

    fn substitute(text: &str, store: &VariableStore, missing: &mut Vec<String>) -> String {
        token_regex()
            .replace_all(text, |caps: &Captures| {
                let name = token_name(caps);
                match store.render(name) {
                    Some(value) => value,
                    None => {
                        record_missing(missing, name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn substitute_json(value: &Value, store: &VariableStore, missing: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => match Self::whole_token(s) {
                Some(name) => match store.get(name) {
                    Some(v) => v.clone(),
                    None => {
                        record_missing(missing, name);
                        value.clone()
                    }
                },
                None => Value::String(Self::substitute(s, store, missing)),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Self::substitute_json(item, store, missing))
                    .collect(),
            ),
            Value::Object(fields) => {
                let mut resolved = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    let key = Self::substitute(key, store, missing);
                    resolved.insert(key, Self::substitute_json(field, store, missing));
                }
                Value::Object(resolved)
            }
            other => other.clone(),
        }
    }
}
