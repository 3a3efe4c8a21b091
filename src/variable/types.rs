use serde::Deserialize;
use std::collections::HashMap;

/// 环境配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// `[runner]` 段，全部可选，缺省值由运行器决定
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunnerSettings {
    /// 单请求超时（秒）
    pub timeout_secs: Option<u64>,

    /// 传输失败时的额外重试次数
    pub retries: Option<u32>,

    /// 是否并行执行显式分组
    pub parallel: Option<bool>,

    /// 并行分组的最大并发数
    pub max_workers: Option<usize>,
}

/// 完整的配置文件 (apiscenario.toml)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub runner: RunnerSettings,

    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

impl ProjectConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }
}
