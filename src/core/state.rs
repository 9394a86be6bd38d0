//! Step state machine

use serde::{Deserialize, Serialize};

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Every step succeeded
    Completed,
    /// A step failed terminally
    Failed,
    /// The run was cancelled
    Cancelled,
}

/// State of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not started
    Pending,
    /// Step is currently running
    Running { attempt: u32 },
    /// Step completed successfully
    Succeeded { attempts: u32 },
    /// Step failed; `retrying` means another attempt follows
    Failed { attempts: u32, retrying: bool },
    /// Step was never attempted
    Skipped,
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded { .. }
                | StepState::Failed { retrying: false, .. }
                | StepState::Skipped
        )
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: &StepState) -> bool {
        match (self, next) {
            (StepState::Pending, StepState::Running { attempt: 1 }) => true,
            (StepState::Pending, StepState::Skipped) => true,
            (StepState::Running { attempt }, StepState::Succeeded { attempts }) => attempt == attempts,
            (StepState::Running { attempt }, StepState::Failed { attempts, .. }) => attempt == attempts,
            (StepState::Failed { attempts, retrying: true }, StepState::Running { attempt }) => {
                *attempt == attempts + 1
            }
            _ => false,
        }
    }
}

/// Tracks one step through its state machine
#[derive(Debug, Clone)]
pub struct StepTracker {
    name: String,
    state: StepState,
}

impl StepTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StepState::Pending,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: StepState) -> bool {
        if !self.state.can_transition_to(&next) {
            tracing::warn!(
                "Step {}: ignoring illegal transition {:?} -> {:?}",
                self.name,
                self.state,
                next
            );
            return false;
        }
        tracing::debug!("Step {}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
        true
    }
}
