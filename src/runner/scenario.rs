use crate::assertion::evaluate_expectation;
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::parser::{Scenario, Suite};
use crate::runner::types::{ScenarioState, StepResult};
use crate::variable::{Extractor, UnresolvedVariable, VariableResolver, VariableStore};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// 一次场景执行的产物
#[derive(Debug)]
pub struct ScenarioRun {
    pub result: StepResult,

    /// 本次执行提取到的变量，由编排器决定是否提交
    pub captured: VariableStore,

    /// 提取失败的变量名，提交时要从变量表中清除旧值
    pub failed_captures: Vec<String>,

    /// 因传输错误中止，可以按策略重试
    pub(crate) retryable: bool,
}

/// 单个场景的执行器：解析 → 发送 → 提取 → 断言
///
/// 只读取变量表，提取结果放进 [`ScenarioRun::captured`]。
pub struct ScenarioRunner<'a> {
    transport: &'a dyn Transport,
    base_url: Option<&'a str>,
    default_headers: &'a BTreeMap<String, String>,
    timeout: Duration,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(transport: &'a dyn Transport, suite: &'a Suite, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: suite.base_url.as_deref(),
            default_headers: &suite.headers,
            timeout,
        }
    }

    pub async fn run(&self, index: usize, scenario: &Scenario, store: &VariableStore) -> ScenarioRun {
        let mut trace = Trace::new(index, scenario);

        // RESOLVING
        trace.advance(ScenarioState::Resolving);
        let request = match self.resolve(scenario, store) {
            Ok(request) => request,
            Err(unresolved) => return trace.abort(unresolved.reasons(), false),
        };
        trace.resolved_url = Some(request.url.to_string());

        // DISPATCHING
        trace.advance(ScenarioState::Dispatching);
        let response = match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                let retryable = e.is_retryable();
                return trace.abort(vec![e.to_string()], retryable);
            }
        };
        trace.actual_status = Some(response.status);

        // EXTRACTING
        trace.advance(ScenarioState::Extracting);
        let mut captured = VariableStore::new();
        let extraction_errors = Extractor::extract(&scenario.expect.save, &response, &mut captured);
        let failed_captures = extraction_errors.iter().map(|e| e.variable.clone()).collect();
        trace.extraction_errors = extraction_errors.iter().map(|e| e.to_string()).collect();

        // ASSERTING
        trace.advance(ScenarioState::Asserting);
        let failures = evaluate_expectation(&scenario.expect, &response)
            .into_iter()
            .map(|f| f.to_string())
            .collect();

        trace.finish(failures, captured, failed_captures)
    }

    /// 合并默认 header、替换占位符、拼接 base_url，然后构造请求
    ///
    /// 所有缺失变量一起报告；请求构造失败（URL、header 非法）推迟到发送阶段报告。
    fn resolve(
        &self,
        scenario: &Scenario,
        store: &VariableStore,
    ) -> Result<PreparedRequest, UnresolvedVariable> {
        let merged = scenario.request.with_default_headers(self.default_headers);

        let base = self.base_url.map(|b| VariableResolver::resolve_str(b, store));
        let resolved = VariableResolver::resolve_request(&merged, store);

        let (base, resolved) = match (base.transpose(), resolved) {
            (Ok(base), Ok(resolved)) => (base, resolved),
            (base, resolved) => {
                let mut names = Vec::new();
                for err in [base.err(), resolved.err()].into_iter().flatten() {
                    for name in err.names {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
                return Err(UnresolvedVariable { names });
            }
        };

        let url = join_url(base.as_deref(), &resolved.url);
        let built = HttpRequest::new(resolved.method, &url).and_then(|mut request| {
            for (key, value) in &resolved.headers {
                request = request.with_header(key, value)?;
            }
            if let Some(body) = &resolved.json {
                request = request.with_json(body)?;
            }
            Ok(request.with_timeout(self.timeout))
        });

        Ok(PreparedRequest { url, built })
    }

    /// 发送请求，整体受超时约束，任何 transport 都不能无限阻塞
    async fn dispatch(&self, request: PreparedRequest) -> Result<HttpResponse, TransportError> {
        let request = request.built?;
        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

struct PreparedRequest {
    url: String,
    built: Result<HttpRequest, TransportError>,
}

/// 相对 URL 拼接到 base_url 后面；已经是绝对 URL 的保持不变
fn join_url(base: Option<&str>, url: &str) -> String {
    match base {
        Some(base) if !has_scheme(url) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        _ => url.to_string(),
    }
}

/// 以 `scheme://` 开头才算绝对 URL，查询串里的 `://` 不算
fn has_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// 执行过程中的可变记录，终止时转换为不可变的 StepResult
struct Trace<'s> {
    index: usize,
    scenario: &'s Scenario,
    state: ScenarioState,
    started: Instant,
    resolved_url: Option<String>,
    actual_status: Option<u16>,
    extraction_errors: Vec<String>,
    aborted_at: Option<ScenarioState>,
}

impl<'s> Trace<'s> {
    fn new(index: usize, scenario: &'s Scenario) -> Self {
        Self {
            index,
            scenario,
            state: ScenarioState::Pending,
            started: Instant::now(),
            resolved_url: None,
            actual_status: None,
            extraction_errors: Vec::new(),
            aborted_at: None,
        }
    }

    fn advance(&mut self, next: ScenarioState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(scenario = %self.scenario.name, "{} -> {}", self.state, next);
        self.state = next;
    }

    fn abort(mut self, reasons: Vec<String>, retryable: bool) -> ScenarioRun {
        self.aborted_at = Some(self.state);
        self.advance(ScenarioState::Aborted);
        ScenarioRun {
            result: self.into_result(reasons),
            captured: VariableStore::new(),
            failed_captures: Vec::new(),
            retryable,
        }
    }

    fn finish(
        mut self,
        failures: Vec<String>,
        captured: VariableStore,
        failed_captures: Vec<String>,
    ) -> ScenarioRun {
        self.advance(ScenarioState::Done);
        ScenarioRun {
            result: self.into_result(failures),
            captured,
            failed_captures,
            retryable: false,
        }
    }

    fn into_result(self, failure_reasons: Vec<String>) -> StepResult {
        StepResult {
            index: self.index,
            scenario_name: self.scenario.name.clone(),
            method: self.scenario.request.method,
            resolved_url: self.resolved_url,
            passed: self.state == ScenarioState::Done && failure_reasons.is_empty(),
            actual_status: self.actual_status,
            failure_reasons,
            extraction_errors: self.extraction_errors,
            final_state: self.state,
            aborted_at: self.aborted_at,
            attempts: 1,
            duration: self.started.elapsed(),
        }
    }
}
