//! Generation Module
//!
//! Drives a generation run and talks to the external processes it needs.
//!
//! # Architecture
//!
//! - [`engine`]: `Generator`, orchestrating a whole run
//! - [`tools`]: bootstrap, pack and validate subprocesses
//! - [`output`]: CI step-output publishing

pub mod engine;
pub mod output;
pub mod tools;

pub use engine::{GenerationReport, Generator};
pub use tools::{CwlTool, ToolRunner};
