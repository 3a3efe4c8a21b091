use serde_json::Value;
use std::collections::HashMap;

/// 一次套件运行内的变量表
///
/// 值保留原生 JSON 类型，只有在渲染进模板时才转换为文本。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    variables: HashMap<String, Value>,
}

impl VariableStore {
    /// 创建新的空变量表
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件覆盖
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// 删除变量，之后引用它的模板会报告未解析
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// 变量的文本形式：字符串原样输出，其它值输出紧凑 JSON
    pub fn render(&self, name: &str) -> Option<String> {
        self.get(name).map(render_value)
    }

    /// 把另一个变量表（例如一次场景捕获的结果）合并进来
    pub fn merge(&mut self, other: VariableStore) {
        self.variables.extend(other.variables);
    }

    /// 批量插入字符串变量（配置文件、CLI 覆盖）
    pub fn extend_strings(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        self.variables
            .extend(vars.into_iter().map(|(k, v)| (k, Value::String(v))));
    }

    /// 按名称排序的变量名，便于日志输出
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
