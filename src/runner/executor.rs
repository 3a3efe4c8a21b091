use crate::Result;
use crate::http::{DEFAULT_TIMEOUT, HttpClient, Transport};
use crate::parser::Suite;
use crate::runner::plan::ExecutionPlan;
use crate::runner::scenario::{ScenarioRun, ScenarioRunner};
use crate::runner::types::{StepResult, SuiteReport};
use crate::variable::{RunnerSettings, VariableStore};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 并行分组的默认并发上限
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// 运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// 单请求超时
    pub timeout: Duration,

    /// 传输失败后的额外重试次数，默认不重试
    pub retries: u32,

    /// 显式分组是否并发执行
    pub parallel: bool,

    pub max_workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            parallel: false,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl RunConfig {
    /// 从配置文件的 `[runner]` 段构建，未设置的字段使用默认值
    pub fn from_settings(settings: &RunnerSettings) -> Self {
        let defaults = Self::default();
        Self {
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retries: settings.retries.unwrap_or(defaults.retries),
            parallel: settings.parallel.unwrap_or(defaults.parallel),
            max_workers: settings.max_workers.unwrap_or(defaults.max_workers).max(1),
        }
    }
}

/// 套件编排器：按计划执行场景，维护变量表，汇总报告
///
/// 变量表只属于一次运行。同一个套件、同样的响应，运行结果完全相同。
pub struct SuiteExecutor {
    transport: Arc<dyn Transport>,
    config: RunConfig,
}

impl SuiteExecutor {
    pub fn new(transport: Arc<dyn Transport>, config: RunConfig) -> Self {
        Self { transport, config }
    }

    /// 使用真实 HTTP 客户端
    pub fn with_http_client(config: RunConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpClient::new()?), config))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn run(&self, suite: &Suite) -> Result<SuiteReport> {
        self.run_with_variables(suite, VariableStore::new()).await
    }

    /// 执行整个套件
    ///
    /// 变量表先用套件的 `variables` 初始化，再用 `initial` 覆盖。
    /// 只有计划校验失败才返回错误，场景失败都记录在报告里。
    pub async fn run_with_variables(
        &self,
        suite: &Suite,
        initial: VariableStore,
    ) -> Result<SuiteReport> {
        let plan = ExecutionPlan::build(&suite.scenarios)?;

        let mut store = VariableStore::new();
        for (name, value) in &suite.variables {
            store.set(name.clone(), value.clone());
        }
        store.merge(initial);

        info!(
            suite = suite.name.as_deref().unwrap_or("<unnamed>"),
            scenarios = suite.len(),
            parallel = self.config.parallel,
            "running suite"
        );

        let started = Instant::now();
        let runner = ScenarioRunner::new(self.transport.as_ref(), suite, self.config.timeout);
        let mut results = Vec::with_capacity(suite.len());

        if self.config.parallel {
            for batch in &plan.batches {
                if batch.is_concurrent() {
                    debug!(
                        group = batch.group.as_deref().unwrap_or_default(),
                        size = batch.indices.len(),
                        "running group concurrently"
                    );
                    let runs = self.run_batch(&runner, suite, &batch.indices, &store).await;
                    results.extend(runs.into_iter().map(|run| commit(&mut store, suite, run)));
                } else {
                    for &index in &batch.indices {
                        let run = self.run_scenario(&runner, suite, index, &store).await;
                        results.push(commit(&mut store, suite, run));
                    }
                }
            }
        } else {
            for index in plan.sequential() {
                let run = self.run_scenario(&runner, suite, index, &store).await;
                results.push(commit(&mut store, suite, run));
            }
        }

        let report = SuiteReport::from_results(suite.name.clone(), results, started.elapsed());
        info!(
            passed = report.passed_count,
            failed = report.failed_count,
            duration_ms = report.total_duration.as_millis() as u64,
            "suite finished"
        );
        Ok(report)
    }

    /// 同一分组内的场景看到的是同一份变量快照，结果按文档顺序返回
    async fn run_batch(
        &self,
        runner: &ScenarioRunner<'_>,
        suite: &Suite,
        indices: &[usize],
        store: &VariableStore,
    ) -> Vec<ScenarioRun> {
        let mut runs: Vec<ScenarioRun> = stream::iter(indices.iter().copied())
            .map(|index| self.run_scenario(runner, suite, index, store))
            .buffer_unordered(self.config.max_workers.max(1))
            .collect()
            .await;

        runs.sort_by_key(|run| run.result.index);
        runs
    }

    /// 执行单个场景，传输失败时按配置重试
    async fn run_scenario(
        &self,
        runner: &ScenarioRunner<'_>,
        suite: &Suite,
        index: usize,
        store: &VariableStore,
    ) -> ScenarioRun {
        let scenario = &suite.scenarios[index];
        let started = Instant::now();
        let mut attempts = 1;

        loop {
            let mut run = runner.run(index, scenario, store).await;

            if run.retryable && attempts <= self.config.retries {
                warn!(
                    scenario = %scenario.name,
                    attempt = attempts,
                    reason = %run.result.failure_reasons.join(", "),
                    "transport failure, retrying"
                );
                attempts += 1;
                continue;
            }

            run.result.attempts = attempts;
            run.result.duration = started.elapsed();
            return run;
        }
    }
}

/// 通过的场景才把提取的变量写回变量表
///
/// 场景失败时清除它 `save` 的全部变量，提取失败的变量同样清除，
/// 下游引用它们会报告未解析，而不是拿到更早场景留下的旧值。
fn commit(store: &mut VariableStore, suite: &Suite, run: ScenarioRun) -> StepResult {
    let result = run.result;

    if result.passed {
        info!(scenario = %result.scenario_name, "passed");
        store.merge(run.captured);
        for name in &run.failed_captures {
            store.remove(name);
        }
    } else {
        for name in suite.scenarios[result.index].expect.save.keys() {
            store.remove(name);
        }
        warn!(
            scenario = %result.scenario_name,
            state = %result.final_state,
            "failed: {}",
            result.failure_reasons.join("; ")
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiScenarioError;
    use crate::http::{HttpRequest, HttpResponse, Method, TransportError, TransportErrorKind};
    use crate::parser::{Expectation, RequestSpec, Scenario};
    use crate::runner::types::ScenarioState;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按 path 返回固定响应，可选延迟；统计调用次数和最大并发
    #[derive(Default)]
    struct MockTransport {
        routes: Vec<(String, u16, Value)>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockTransport {
        fn route(mut self, path: &str, status: u16, body: Value) -> Self {
            self.routes.push((path.to_string(), status, body));
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let path = request.url.path().to_string();
            self.calls.lock().unwrap().push(path.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.routes
                .iter()
                .find(|(p, _, _)| *p == path)
                .map(|(_, status, body)| HttpResponse::from_json(*status, body))
                .ok_or_else(|| TransportError::new(TransportErrorKind::Connect, "refused"))
        }
    }

    /// 前 `failures` 次返回连接错误
    struct FlakyTransport {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(TransportError::new(TransportErrorKind::Connect, "reset"))
            } else {
                Ok(HttpResponse::from_json(200, &json!({"ok": true})))
            }
        }
    }

    fn get(name: &str, path: &str, status: u16) -> Scenario {
        Scenario::new(
            name,
            RequestSpec::new(Method::Get, path),
            Expectation::status(status),
        )
    }

    fn create_then_fetch() -> Suite {
        Suite::new(vec![
            Scenario::new(
                "A",
                RequestSpec::new(Method::Post, "/items").with_json(json!({"name": "x"})),
                Expectation::status(201).with_save("id", "$.id"),
            ),
            get("B", "/items/{id}", 200),
        ])
        .with_name("items")
        .with_base_url("http://api.test")
    }

    fn executor(transport: Arc<MockTransport>, config: RunConfig) -> SuiteExecutor {
        SuiteExecutor::new(transport, config)
    }

    #[tokio::test]
    async fn test_captured_value_flows_downstream() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/items", 201, json!({"id": 42}))
                .route("/items/42", 200, json!({"id": 42})),
        );
        let report = executor(transport.clone(), RunConfig::default())
            .run(&create_then_fetch())
            .await
            .unwrap();

        assert_eq!(report.suite_name.as_deref(), Some("items"));
        assert_eq!(report.passed_count, 2);
        assert_eq!(report.failed_count, 0);
        assert_eq!(
            report.results[1].resolved_url.as_deref(),
            Some("http://api.test/items/42")
        );
        assert_eq!(transport.calls(), vec!["/items", "/items/42"]);
    }

    #[tokio::test]
    async fn test_failed_upstream_does_not_publish_captures() {
        // A 返回了 id，但状态码不符，B 不能用到它
        let transport = Arc::new(
            MockTransport::default()
                .route("/items", 500, json!({"id": 42}))
                .route("/items/42", 200, json!({})),
        );
        let report = executor(transport.clone(), RunConfig::default())
            .run(&create_then_fetch())
            .await
            .unwrap();

        assert_eq!(report.failed_count, 2);
        assert_eq!(report.results[0].final_state, ScenarioState::Done);
        assert_eq!(report.results[1].final_state, ScenarioState::Aborted);
        assert_eq!(
            report.results[1].failure_reasons,
            vec!["unresolved variable: id"]
        );
        assert_eq!(transport.calls(), vec!["/items"]);
    }

    #[tokio::test]
    async fn test_failed_later_saver_clears_earlier_value() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/first", 200, json!({"id": 1}))
                .route("/second", 500, json!({"id": 2}))
                .route("/items/1", 200, json!({})),
        );
        let suite = Suite::new(vec![
            Scenario::new(
                "first",
                RequestSpec::new(Method::Post, "/first"),
                Expectation::status(200).with_save("id", "$.id"),
            ),
            Scenario::new(
                "second",
                RequestSpec::new(Method::Post, "/second"),
                Expectation::status(200).with_save("id", "$.id"),
            ),
            get("fetch", "/items/{id}", 200),
        ])
        .with_base_url("http://api.test");

        let report = executor(transport.clone(), RunConfig::default())
            .run(&suite)
            .await
            .unwrap();

        assert!(report.results[0].passed);
        assert!(!report.results[1].passed);
        assert!(report.results[2].is_aborted());
        assert_eq!(
            report.results[2].failure_reasons,
            vec!["unresolved variable: id"]
        );
        assert_eq!(transport.calls(), vec!["/first", "/second"]);
    }

    #[tokio::test]
    async fn test_failed_extraction_clears_earlier_value() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/first", 200, json!({"id": 1}))
                .route("/second", 200, json!({"other": true}))
                .route("/items/1", 200, json!({})),
        );
        let suite = Suite::new(vec![
            Scenario::new(
                "first",
                RequestSpec::new(Method::Get, "/first"),
                Expectation::status(200).with_save("id", "$.id"),
            ),
            Scenario::new(
                "second",
                RequestSpec::new(Method::Get, "/second"),
                Expectation::status(200).with_save("id", "$.id"),
            ),
            get("fetch", "/items/{id}", 200),
        ])
        .with_base_url("http://api.test");

        let report = executor(transport, RunConfig::default())
            .run(&suite)
            .await
            .unwrap();

        assert!(report.results[1].passed);
        assert_eq!(report.results[1].extraction_errors.len(), 1);
        assert_eq!(
            report.results[2].failure_reasons,
            vec!["unresolved variable: id"]
        );
    }

    #[tokio::test]
    async fn test_suite_and_initial_variables() {
        let transport = Arc::new(MockTransport::default().route("/users/7", 200, json!({})));
        let suite = Suite::new(vec![get("user", "/users/{user}", 200)])
            .with_base_url("{host}")
            .with_variable("host", "http://wrong.test")
            .with_variable("user", 7);

        let mut initial = VariableStore::new();
        initial.set("host", "http://api.test");

        let report = executor(transport, RunConfig::default())
            .run_with_variables(&suite, initial)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.results[0].resolved_url.as_deref(),
            Some("http://api.test/users/7")
        );
    }

    #[tokio::test]
    async fn test_invalid_plan_sends_nothing() {
        let transport = Arc::new(MockTransport::default().route("/a", 200, json!({})));
        let suite = Suite::new(vec![
            get("a", "/a", 200).in_group("g"),
            get("b", "/a", 200),
            get("c", "/a", 200).in_group("g"),
        ])
        .with_base_url("http://api.test");

        let err = executor(transport.clone(), RunConfig::default())
            .run(&suite)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiScenarioError::ConfigurationError(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retries_transport_failures() {
        let transport = Arc::new(FlakyTransport {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let suite = Suite::new(vec![get("ping", "/ping", 200)]).with_base_url("http://api.test");

        let config = RunConfig {
            retries: 2,
            ..RunConfig::default()
        };
        let report = SuiteExecutor::new(transport.clone(), config)
            .run(&suite)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let transport = Arc::new(FlakyTransport {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let suite = Suite::new(vec![get("ping", "/ping", 200)]).with_base_url("http://api.test");

        let report = SuiteExecutor::new(transport.clone(), RunConfig::default())
            .run(&suite)
            .await
            .unwrap();

        assert_eq!(report.failed_count, 1);
        assert!(report.results[0].is_aborted());
        assert_eq!(report.results[0].attempts, 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parallel_group_runs_concurrently_in_document_order() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/login", 200, json!({"token": "t"}))
                .route("/a", 200, json!({"a": 1}))
                .route("/b", 200, json!({"b": 2}))
                .route("/c", 200, json!({"c": 3}))
                .route("/after/1/2", 200, json!({}))
                .delayed(Duration::from_millis(50)),
        );
        let suite = Suite::new(vec![
            Scenario::new(
                "login",
                RequestSpec::new(Method::Post, "/login"),
                Expectation::status(200).with_save("token", "$.token"),
            ),
            Scenario::new(
                "a",
                RequestSpec::new(Method::Get, "/a").with_header("Authorization", "{token}"),
                Expectation::status(200).with_save("a", "$.a"),
            )
            .in_group("reads"),
            Scenario::new(
                "b",
                RequestSpec::new(Method::Get, "/b").with_header("Authorization", "{token}"),
                Expectation::status(200).with_save("b", "$.b"),
            )
            .in_group("reads"),
            get("c", "/c", 200).in_group("reads"),
            get("after", "/after/{a}/{b}", 200),
        ])
        .with_base_url("http://api.test");

        let config = RunConfig {
            parallel: true,
            max_workers: 2,
            ..RunConfig::default()
        };
        let report = executor(transport.clone(), config).run(&suite).await.unwrap();

        assert!(report.is_success(), "{:?}", report.results);
        let order: Vec<&str> = report
            .results
            .iter()
            .map(|r| r.scenario_name.as_str())
            .collect();
        assert_eq!(order, vec!["login", "a", "b", "c", "after"]);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_group_without_parallel_is_sequential() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/a", 200, json!({}))
                .route("/b", 200, json!({}))
                .delayed(Duration::from_millis(10)),
        );
        let suite = Suite::new(vec![
            get("a", "/a", 200).in_group("g"),
            get("b", "/b", 200).in_group("g"),
        ])
        .with_base_url("http://api.test");

        let report = executor(transport.clone(), RunConfig::default())
            .run(&suite)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls(), vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let transport = Arc::new(
            MockTransport::default()
                .route("/items", 201, json!({"id": 42}))
                .route("/items/42", 404, json!({})),
        );
        let executor = executor(transport, RunConfig::default());
        let suite = create_then_fetch();

        let strip = |report: SuiteReport| -> Vec<(bool, Option<u16>, Vec<String>)> {
            report
                .results
                .into_iter()
                .map(|r| (r.passed, r.actual_status, r.failure_reasons))
                .collect()
        };

        let first = strip(executor.run(&suite).await.unwrap());
        let second = strip(executor.run(&suite).await.unwrap());
        assert_eq!(first, second);
        assert_eq!(first[1].2, vec!["status: expected 200, got 404"]);
    }

    #[test]
    fn test_run_config_from_settings() {
        let settings = RunnerSettings {
            timeout_secs: Some(5),
            retries: None,
            parallel: Some(true),
            max_workers: Some(0),
        };
        let config = RunConfig::from_settings(&settings);

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 0);
        assert!(config.parallel);
        assert_eq!(config.max_workers, 1);
        assert_eq!(RunConfig::from_settings(&RunnerSettings::default()), RunConfig::default());
    }
}
