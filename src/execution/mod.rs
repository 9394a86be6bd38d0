//! Pipeline execution engine

pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod retry;

pub use events::{EventHandler, ExecutionEvent};
pub use executor::StepExecutor;
pub use orchestrator::PipelineOrchestrator;
pub use retry::RetryPolicy;
