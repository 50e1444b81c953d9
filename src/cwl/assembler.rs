//! Workflow Graph Assembler
//!
//! Builds the top-level `Workflow` document: workflow parameters, one node
//! per step pointing at its already-written tool document, typed edges from
//! step inputs, and scatter declarations.

use log::{debug, info};

use super::document::{
    InputParameter, Requirement, ResourceRequirement, Sources, Workflow, WorkflowOutputParameter,
    WorkflowStep, WorkflowStepInput, CWL_VERSION,
};
use crate::error::{GenerateError, Result};
use crate::workflow::model::{ResolvedStepSpec, WorkflowSpec};

fn workflow_step(resolved: &ResolvedStepSpec<'_>) -> Result<WorkflowStep> {
    let step = resolved.step;
    if !resolved.run.is_absolute() {
        return Err(GenerateError::RunPathNotAbsolute {
            step: step.id.clone(),
            path: resolved.run.clone(),
        });
    }

    let scatter = if step.scatter.is_empty() {
        None
    } else {
        Some(step.scatter.clone())
    };

    Ok(WorkflowStep {
        id: step.id.clone(),
        run: resolved.run.display().to_string(),
        in_: step
            .inputs
            .iter()
            .map(|i| WorkflowStepInput {
                id: i.id.clone(),
                source: i.source.clone(),
                value_from: i.value_from.clone(),
                default: i.default.clone(),
            })
            .collect(),
        out: step.outputs.iter().map(|o| o.id.clone()).collect(),
        scatter,
        scatter_method: step.resolved_scatter_method(),
    })
}

/// Requirements the assembled graph needs to be valid.
fn workflow_requirements(
    spec: &WorkflowSpec,
    outputs: &[WorkflowOutputParameter],
) -> Vec<Requirement> {
    let mut requirements = vec![Requirement::ScatterFeatureRequirement];

    let uses_expressions = spec
        .steps
        .iter()
        .flat_map(|s| s.inputs.iter())
        .any(|i| i.value_from.is_some());
    if uses_expressions {
        requirements.push(Requirement::InlineJavascriptRequirement);
        requirements.push(Requirement::StepInputExpressionRequirement);
    }

    if outputs.iter().any(|o| o.output_source.is_multiple()) {
        requirements.push(Requirement::MultipleInputFeatureRequirement);
    }

    if let Some(resources) = ResourceRequirement::from_resources(&spec.resources) {
        requirements.push(Requirement::ResourceRequirement(resources));
    }

    requirements
}

/// Assembles the workflow document.
///
/// Every entry of `steps` must carry an absolute `run` path.
pub fn assemble_workflow(spec: &WorkflowSpec, steps: &[ResolvedStepSpec<'_>]) -> Result<Workflow> {
    let inputs = spec
        .inputs
        .iter()
        .map(|i| InputParameter {
            id: i.id.clone(),
            label: i.label.clone(),
            doc: i.doc.clone(),
            type_: i.type_.clone(),
            default: i.default.clone(),
        })
        .collect();

    let outputs: Vec<WorkflowOutputParameter> = spec
        .outputs
        .iter()
        .map(|o| WorkflowOutputParameter {
            id: o.id.clone(),
            type_: o.type_.clone(),
            output_source: Sources(o.source.clone()),
        })
        .collect();

    let steps = steps
        .iter()
        .map(workflow_step)
        .collect::<Result<Vec<_>>>()?;

    let requirements = workflow_requirements(spec, &outputs);
    debug!("Workflow '{}' requirements: {:?}", spec.id, requirements);

    info!(
        "Assembled workflow '{}' with {} steps",
        spec.id,
        steps.len()
    );

    Ok(Workflow {
        cwl_version: CWL_VERSION.to_string(),
        id: spec.id.clone(),
        label: spec.label.clone(),
        doc: spec.doc.clone(),
        requirements,
        inputs,
        outputs,
        steps,
    })
}
