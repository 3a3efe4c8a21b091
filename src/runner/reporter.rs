use crate::Result;
use crate::http::types::reason_phrase;
use crate::runner::types::{StepResult, SuiteReport};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

/// 报告输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印完整报告
    pub fn print_report(&self, report: &SuiteReport, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Console => {
                self.print_header(report);
                for result in &report.results {
                    self.print_result(result);
                }
                if self.verbose {
                    println!("{}", self.render_table(report));
                }
                self.print_summary(report);
            }
            OutputFormat::Json => println!("{}", Self::render_json(report)?),
        }
        Ok(())
    }

    /// 打印测试开始
    pub fn print_header(&self, report: &SuiteReport) {
        let name = report.suite_name.as_deref().unwrap_or("suite");
        println!("\nRan {} scenarios from {}\n", report.total(), name.bold());
    }

    /// 打印单个场景结果
    pub fn print_result(&self, result: &StepResult) {
        let symbol = if result.passed { "✓".green() } else { "✗".red() };
        let url = result.resolved_url.as_deref().unwrap_or("-");

        let status = match result.actual_status {
            Some(code) => format!(" → {} {}", code, reason_phrase(code)),
            None => String::new(),
        };
        let retries = if result.attempts > 1 {
            format!(", {} attempts", result.attempts)
        } else {
            String::new()
        };

        println!(
            " {} {} {} {}{} ({}ms{})",
            symbol,
            result.display_name(),
            result.method.to_string().cyan(),
            url,
            status,
            result.duration.as_millis(),
            retries
        );

        for reason in &result.failure_reasons {
            println!("     {} {}", "✗".red(), reason.red());
        }

        for warning in &result.extraction_errors {
            println!("     {}: {}", "Warning".yellow(), warning);
        }

        if let Some(note) = abort_note(result) {
            println!("     {}", note.dimmed());
        }
    }

    /// 打印测试摘要
    pub fn print_summary(&self, report: &SuiteReport) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if report.failed_count == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Scenarios".bold(),
                report.passed_count.to_string().green(),
                report.total()
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Scenarios".bold(),
                report.passed_count.to_string().green(),
                report.failed_count.to_string().red(),
                report.total()
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            report.total_duration.as_secs_f64()
        );
        println!();
    }

    /// 结果表格，verbose 模式下显示
    pub fn render_table(&self, report: &SuiteReport) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["#", "Scenario", "Method", "URL", "Status", "State", "Duration"]);

        for result in &report.results {
            let status_color = if result.passed { Color::Green } else { Color::Red };
            let status = result
                .actual_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());

            table.add_row(vec![
                Cell::new(result.index + 1),
                Cell::new(&result.scenario_name),
                Cell::new(result.method),
                Cell::new(result.resolved_url.as_deref().unwrap_or("-")).add_attribute(Attribute::Dim),
                Cell::new(status).fg(status_color),
                Cell::new(result.final_state),
                Cell::new(format!("{}ms", result.duration.as_millis())),
            ]);
        }

        table
    }

    pub fn render_json(report: &SuiteReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

/// 中止的场景说明停在哪个阶段
fn abort_note(result: &StepResult) -> Option<String> {
    result
        .aborted_at
        .map(|state| format!("aborted during {}", state))
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
