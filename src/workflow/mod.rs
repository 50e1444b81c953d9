//! Pipeline Description Module
//!
//! Data structures and utilities for loading and validating the declarative
//! pipeline description that documents are generated from.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowSpec, StepSpec, ...)
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Structural validation rules

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{
    resolve, tool_path, Dependencies, InputParam, OutputParam, ResolvedStepSpec, Resources,
    ScatterMethod, StepInput, StepKind, StepOutput, StepSpec, WorkflowSpec,
};
pub use parser::{load_workflow_spec, parse_workflow_spec};
pub use validator::{validate_workflow, ValidationError};
