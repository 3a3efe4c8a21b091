use crate::http::Method;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 单个场景的执行状态
///
/// 严格按顺序前进，不回退；`Aborted` 可以从任何非终止状态进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    Resolving,
    Dispatching,
    Extracting,
    Asserting,
    Done,
    Aborted,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioState::Done | ScenarioState::Aborted)
    }

    /// 状态机里的下一个正常状态
    pub fn next(&self) -> Option<ScenarioState> {
        match self {
            ScenarioState::Pending => Some(ScenarioState::Resolving),
            ScenarioState::Resolving => Some(ScenarioState::Dispatching),
            ScenarioState::Dispatching => Some(ScenarioState::Extracting),
            ScenarioState::Extracting => Some(ScenarioState::Asserting),
            ScenarioState::Asserting => Some(ScenarioState::Done),
            ScenarioState::Done | ScenarioState::Aborted => None,
        }
    }

    pub fn can_transition_to(&self, target: ScenarioState) -> bool {
        match target {
            ScenarioState::Aborted => !self.is_terminal(),
            _ => self.next() == Some(target),
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioState::Pending => "PENDING",
            ScenarioState::Resolving => "RESOLVING",
            ScenarioState::Dispatching => "DISPATCHING",
            ScenarioState::Extracting => "EXTRACTING",
            ScenarioState::Asserting => "ASSERTING",
            ScenarioState::Done => "DONE",
            ScenarioState::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// 单个场景的执行结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// 场景在文档中的位置（从 0 开始）
    pub index: usize,

    pub scenario_name: String,

    pub method: Method,

    /// 变量替换后的完整 URL；解析阶段失败时为空
    pub resolved_url: Option<String>,

    pub passed: bool,

    /// 没有拿到响应时为空
    pub actual_status: Option<u16>,

    /// 按发生顺序排列的失败原因
    pub failure_reasons: Vec<String>,

    /// 提取失败不影响 `passed`，单独记录
    pub extraction_errors: Vec<String>,

    pub final_state: ScenarioState,

    /// 中止时所处的阶段（RESOLVING / DISPATCHING）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<ScenarioState>,

    /// 包含重试在内的执行次数
    pub attempts: u32,

    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl StepResult {
    pub fn is_aborted(&self) -> bool {
        self.final_state == ScenarioState::Aborted
    }

    /// 展示用名称，带上文档序号
    pub fn display_name(&self) -> String {
        format!("[{}] {}", self.index + 1, self.scenario_name)
    }
}

/// 一次套件运行的汇总，是运行唯一的对外输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub suite_name: Option<String>,

    /// 按文档顺序排列，与完成顺序无关
    pub results: Vec<StepResult>,

    pub passed_count: usize,

    pub failed_count: usize,

    #[serde(rename = "total_duration_ms", with = "duration_ms")]
    pub total_duration: Duration,
}

impl SuiteReport {
    pub fn from_results(
        suite_name: Option<String>,
        mut results: Vec<StepResult>,
        total_duration: Duration,
    ) -> Self {
        results.sort_by_key(|r| r.index);
        let passed_count = results.iter().filter(|r| r.passed).count();

        Self {
            suite_name,
            failed_count: results.len() - passed_count,
            passed_count,
            results,
            total_duration,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Duration 序列化为毫秒整数
mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
