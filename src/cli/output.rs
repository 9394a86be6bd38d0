//! CLI output formatting

use crate::{
    core::{ExecutionStatus, RunResult, StepOutcome},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a history entry for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Cancelled => WARN,
    };
    let id = summary.execution_id.to_string();

    let mut line = format!(
        "{} {} - {} - {} ({}/{}) - {}",
        status_icon,
        style(&id[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_steps,
        summary.total_steps,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    if let Some(step) = &summary.failed_step {
        line.push_str(&format!(" - failed at {}", style(step).red()));
    }
    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({} steps)",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps
        ),
        ExecutionEvent::StepStarted {
            step_name,
            attempt,
            max_attempts,
        } => {
            if *attempt > 1 {
                format!(
                    "{} {} (attempt {}/{})",
                    SPINNER,
                    style(step_name).cyan(),
                    attempt,
                    style(max_attempts).dim()
                )
            } else {
                format!("{} {}", SPINNER, style(step_name).cyan())
            }
        }
        ExecutionEvent::StepRetrying {
            step_name,
            error,
            delay,
            ..
        } => format!(
            "{} {}: {}, retrying in {}",
            WARN,
            style(step_name).yellow(),
            error,
            format_duration(*delay)
        ),
        ExecutionEvent::StepCompleted {
            step_name,
            duration_ms,
            ..
        } => format!(
            "{} {} {}",
            CHECK,
            style(step_name).green(),
            style(format_duration(Duration::from_millis(*duration_ms))).dim()
        ),
        ExecutionEvent::StepFailed {
            step_name, error, ..
        } => format!("{} {}: {}", CROSS, style(step_name).red(), style(error).dim()),
        ExecutionEvent::StepSkipped { step_name, reason } => {
            format!("{} {} ({})", SKIP, style(step_name).dim(), reason)
        }
        ExecutionEvent::PipelineCompleted {
            pipeline_name,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("completed {}", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                ExecutionStatus::Cancelled => style("was cancelled").yellow().to_string(),
            };
            format!("{} {} {}", INFO, style(pipeline_name).bold(), status_str)
        }
    }
}

/// Format the captured output tails of every failed step
pub fn format_failure_details(result: &RunResult) -> String {
    let mut out = String::new();
    for step in &result.steps {
        let StepOutcome::Failed { error } = &step.outcome else {
            continue;
        };
        out.push_str(&format!(
            "{} {} after {} attempt(s): {}\n",
            CROSS,
            style(&step.step_name).bold(),
            step.attempts,
            error
        ));
        for (label, tail) in [("stdout", &step.stdout_tail), ("stderr", &step.stderr_tail)] {
            if tail.is_empty() {
                continue;
            }
            out.push_str(&format!("  {}\n", style(label).dim()));
            for line in tail.lines() {
                out.push_str(&format!("    {}\n", line));
            }
        }
    }
    out
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
