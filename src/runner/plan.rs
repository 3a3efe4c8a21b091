use crate::error::{ApiScenarioError, Result};
use crate::parser::Scenario;
use std::collections::{BTreeSet, HashMap, HashSet};

/// 一批执行单元：无分组的场景单独成批，同一分组的连续场景合成一批
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub group: Option<String>,
    pub indices: Vec<usize>,
}

impl Batch {
    /// 是否可以并发执行
    pub fn is_concurrent(&self) -> bool {
        self.group.is_some() && self.indices.len() > 1
    }
}

/// 套件的执行计划，按文档顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub batches: Vec<Batch>,
}

impl ExecutionPlan {
    /// 根据场景的分组标签构建计划
    ///
    /// 分组必须是连续的一段，同组场景之间不能保存同名变量。
    /// 所有问题汇总成一个 `ConfigurationError`，任何场景都不会执行。
    pub fn build(scenarios: &[Scenario]) -> Result<Self> {
        let mut batches: Vec<Batch> = Vec::new();

        for (index, scenario) in scenarios.iter().enumerate() {
            match (&scenario.group, batches.last_mut()) {
                (Some(group), Some(last)) if last.group.as_ref() == Some(group) => {
                    last.indices.push(index);
                }
                _ => batches.push(Batch {
                    group: scenario.group.clone(),
                    indices: vec![index],
                }),
            }
        }

        let plan = Self { batches };
        let problems = plan.validate(scenarios);
        if !problems.is_empty() {
            return Err(ApiScenarioError::ConfigurationError(problems.join("; ")));
        }

        Ok(plan)
    }

    /// 展平成文档顺序，未开启并行时使用
    pub fn sequential(&self) -> Vec<usize> {
        self.batches
            .iter()
            .flat_map(|b| b.indices.iter().copied())
            .collect()
    }

    fn validate(&self, scenarios: &[Scenario]) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen_groups: HashMap<&str, usize> = HashMap::new();

        for batch in &self.batches {
            let Some(group) = batch.group.as_deref() else {
                continue;
            };

            if seen_groups.insert(group, batch.indices[0]).is_some() {
                problems.push(format!(
                    "group '{}' is not contiguous (split at scenario {})",
                    group,
                    batch.indices[0] + 1
                ));
            }

            let mut saved = HashSet::new();
            let mut conflicts = BTreeSet::new();
            for &i in &batch.indices {
                for name in scenarios[i].expect.save.keys() {
                    if !saved.insert(name.as_str()) {
                        conflicts.insert(name.as_str());
                    }
                }
            }
            for name in conflicts {
                problems.push(format!(
                    "group '{}' saves variable '{}' more than once",
                    group, name
                ));
            }
        }

        problems
    }
}
