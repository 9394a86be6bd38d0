//! Core domain models for Pipeline
//!
//! This module defines the fundamental data structures that represent
//! pipelines, steps, their results, and their configuration.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod result;
pub mod state;
pub mod step;

pub use error::*;
pub use pipeline::*;
pub use result::*;
pub use state::*;
pub use step::*;
