use crate::Result;
use crate::variable::resolver::VariableResolver;
use crate::variable::store::VariableStore;
use crate::variable::types::ProjectConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "apiscenario.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// 查找配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/apiscenario/
    pub fn find() -> Option<PathBuf> {
        Self::find_from_current_dir().or_else(Self::find_in_user_dir)
    }

    /// 查找并加载配置文件；找到但解析失败时返回错误
    pub fn find_and_load() -> Result<Option<ProjectConfig>> {
        match Self::find() {
            Some(path) => Self::load_from_path(path).map(Some),
            None => Ok(None),
        }
    }

    fn find_from_current_dir() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            // 尝试父目录
            if !current.pop() {
                break;
            }
        }

        None
    }

    fn find_in_user_dir() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("apiscenario")
            .join(Self::CONFIG_FILE);

        config_path.exists().then_some(config_path)
    }

    /// 构建初始变量表
    /// env_name: 环境名称（如 "dev", "prod"）
    /// cli_vars: CLI 传入的变量覆盖（--var key=value）
    pub fn build_store(
        config: &ProjectConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> VariableStore {
        let mut store = VariableStore::new();

        // 1. 从配置文件加载环境变量
        if let Some(env) = env_name.and_then(|name| config.get_environment(name)) {
            store.extend_strings(env.variables.iter().map(|(key, value)| {
                // 解析系统环境变量 ${VAR}
                (key.clone(), VariableResolver::resolve_env_vars(value))
            }));
        }

        // 2. 应用 CLI 覆盖（优先级最高）
        store.extend_strings(cli_vars.iter().cloned());

        store
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}
