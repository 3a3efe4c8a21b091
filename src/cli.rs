use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use apiscenario::parser::load_suite;
use apiscenario::runner::{ExecutionPlan, OutputFormat, RunConfig, SuiteExecutor, TestReporter};
use apiscenario::variable::{ConfigLoader, ProjectConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

#[derive(Parser)]
#[command(author, version, about = "Run declarative HTTP API test suites", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行套件文件（YAML 或 JSON）
    Run(RunArgs),

    /// 只加载并校验套件，不发送请求
    Validate {
        path: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// 套件文件路径
    pub path: PathBuf,

    /// 配置文件路径，缺省时自动查找 apiscenario.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 使用配置文件中的环境
    #[arg(short, long)]
    pub env: Option<String>,

    /// 变量覆盖，可重复：--var token=abc
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// 并发执行显式分组
    #[arg(long)]
    pub parallel: bool,

    /// 并发上限
    #[arg(long)]
    pub workers: Option<usize>,

    /// 单请求超时（秒）
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// 传输失败的重试次数
    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long, value_enum, default_value_t = Format::Console)]
    pub format: Format,

    /// 显示结果表格
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Console,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Console => OutputFormat::Console,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

/// 执行套件，全部通过返回成功退出码
pub async fn run(args: RunArgs) -> Result<ExitCode> {
    let suite = load_suite(&args.path)
        .with_context(|| format!("failed to load suite {}", args.path.display()))?;

    let project = load_config(args.config.as_ref())?;
    if let Some(env) = &args.env {
        if project.get_environment(env).is_none() {
            bail!("environment '{}' not found in config", env);
        }
    }

    let mut config = RunConfig::from_settings(&project.runner);
    if args.parallel {
        config.parallel = true;
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers.max(1);
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    debug!(?config, "run configuration");

    let store = ConfigLoader::build_store(&project, args.env.as_deref(), &args.vars);
    let executor = SuiteExecutor::with_http_client(config)?;
    let report = executor.run_with_variables(&suite, store).await?;

    TestReporter::new(args.verbose).print_report(&report, args.format.into())?;

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// 加载套件并构建执行计划，报告格式问题
pub fn validate(path: PathBuf) -> Result<ExitCode> {
    let suite = load_suite(&path)
        .with_context(|| format!("failed to load suite {}", path.display()))?;
    let plan = ExecutionPlan::build(&suite.scenarios)?;

    info!(
        scenarios = suite.len(),
        batches = plan.batches.len(),
        "suite is valid"
    );
    println!(
        "{}: {} scenarios, {} batches",
        path.display(),
        suite.len(),
        plan.batches.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&PathBuf>) -> Result<ProjectConfig> {
    let config = match path {
        Some(path) => Some(
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
        ),
        None => ConfigLoader::find_and_load()?,
    };
    Ok(config.unwrap_or_default())
}
