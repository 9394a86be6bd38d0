//! Process exit codes for pipeline runs

use crate::cli::output::format_failure_details;
use crate::core::{PipelineError, RunResult};

/// Every step succeeded
pub const EXIT_SUCCESS: i32 = 0;
/// A step failed
pub const EXIT_FAILED: i32 = 1;
/// The run could not start
pub const EXIT_PRE_RUN: i32 = 2;
/// The run was interrupted
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for a finished run
pub fn exit_code(result: &RunResult) -> i32 {
    if result.success {
        EXIT_SUCCESS
    } else if result.cancelled {
        EXIT_CANCELLED
    } else {
        EXIT_FAILED
    }
}

/// Exit code for a run attempt, including ones rejected before any step ran
pub fn run_exit_code(outcome: &Result<RunResult, PipelineError>) -> i32 {
    match outcome {
        Ok(result) => exit_code(result),
        Err(_) => EXIT_PRE_RUN,
    }
}

/// What goes to stderr when a run does not succeed
///
/// Failed step tails followed by the one-line JSON summary. `None` for a
/// successful run.
pub fn failure_report(result: &RunResult) -> Result<Option<String>, serde_json::Error> {
    if result.success {
        return Ok(None);
    }
    let summary = serde_json::to_string(&result.machine_summary())?;
    Ok(Some(format!("{}{}\n", format_failure_details(result), summary)))
}
