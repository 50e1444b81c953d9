//! Pipeline Validation
//!
//! Structural checks run once after loading:
//! - Workflow and step ids are present and unique
//! - Step input ids are unique within their step
//! - Every scatter id names a declared input of the same step
//! - Every workflow output has at least one source
//! - Image-based command templates compile against the step's inputs
//!
//! References between steps (`source`, `outputSource`) are resolved by the
//! workflow engine and are not checked here.

use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use super::model::{StepKind, StepSpec, WorkflowSpec};
use crate::cwl::command::compile_command;
use crate::error::GenerateError;

/// Validation error types for user-friendly error messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Workflow has no id")]
    EmptyWorkflowId,

    #[error("Workflow has no steps")]
    EmptyWorkflow,

    #[error("Step has empty or whitespace-only ID")]
    EmptyStepId,

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("Step '{step}' declares input '{input}' more than once")]
    DuplicateInputId { step: String, input: String },

    #[error("Step '{0}' sets both 'script' and 'docker_image'; exactly one is allowed")]
    ConflictingStepKind(String),

    #[error("Step '{0}' has no docker image or script")]
    MissingStepKind(String),

    #[error("Step '{0}' uses a docker image but has no command")]
    MissingCommand(String),

    #[error("Step '{step}' has an invalid command: {reason}")]
    InvalidCommand { step: String, reason: String },

    #[error("Step '{step}' scatters over '{input}', which is not one of its inputs")]
    UnknownScatterInput { step: String, input: String },

    #[error("Output '{0}' has no source")]
    EmptyOutputSource(String),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validates a single step's fields.
fn validate_step(step: &StepSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.id.trim().is_empty() {
        errors.push(ValidationError::EmptyStepId);
        return errors; // Can't validate further without ID
    }

    let mut input_ids: HashSet<&str> = HashSet::new();
    for input in &step.inputs {
        if !input_ids.insert(input.id.as_str()) {
            errors.push(ValidationError::DuplicateInputId {
                step: step.id.clone(),
                input: input.id.clone(),
            });
        }
    }

    for scatter_id in &step.scatter {
        if !input_ids.contains(scatter_id.as_str()) {
            errors.push(ValidationError::UnknownScatterInput {
                step: step.id.clone(),
                input: scatter_id.clone(),
            });
        }
    }

    if !step.scatter.is_empty() {
        debug!("Step '{}' scatters over {:?}", step.id, step.scatter);
    }

    if let StepKind::Image { command, .. } = &step.kind {
        match compile_command(&step.id, command, &step.inputs) {
            Ok(_) => {}
            Err(GenerateError::NoInvocation(id)) => {
                errors.push(ValidationError::MissingCommand(id));
            }
            Err(e) => errors.push(ValidationError::InvalidCommand {
                step: step.id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    errors
}

/// Validates the entire pipeline.
///
/// All problems are collected before returning so the operator can fix them
/// in one pass.
pub fn validate_workflow(workflow: &WorkflowSpec) -> Result<(), ValidationError> {
    info!("Validating workflow with {} steps", workflow.steps.len());

    if workflow.id.trim().is_empty() {
        return Err(ValidationError::EmptyWorkflowId);
    }

    if workflow.steps.is_empty() {
        return Err(ValidationError::EmptyWorkflow);
    }

    let mut all_errors = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if !step.id.trim().is_empty() && !seen_ids.insert(step.id.as_str()) {
            all_errors.push(ValidationError::DuplicateStepId(step.id.clone()));
        }
        all_errors.extend(validate_step(step));
    }

    for output in &workflow.outputs {
        if output.source.is_empty() {
            all_errors.push(ValidationError::EmptyOutputSource(output.id.clone()));
        }
    }

    match all_errors.len() {
        0 => {
            info!("Workflow '{}' validated", workflow.id);
            Ok(())
        }
        1 => Err(all_errors.remove(0)),
        _ => Err(ValidationError::Multiple(all_errors)),
    }
}
