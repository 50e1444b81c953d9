//! Pipeline Parser
//!
//! Loads a pipeline description from YAML. The document is first read into
//! loosely-typed `Raw*` structs mirroring the file, then converted into the
//! typed model: the step variant (script or image) is decided here, once,
//! and scatter flags are folded into each step's scatter list.
//!
//! Relative `script` and `requirements` paths are kept as written and
//! resolved against the current working directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::model::{
    label_and_doc, Dependencies, InputParam, OutputParam, Resources, ScatterMethod, StepInput,
    StepKind, StepOutput, StepSpec, WorkflowSpec,
};
use super::validator::{validate_workflow, ValidationError};
use crate::error::{GenerateError, Result};

#[derive(Deserialize, Debug)]
struct RawWorkflow {
    id: String,
    doc: Option<String>,
    label: Option<String>,
    #[serde(default)]
    inputs: Option<Vec<RawInput>>,
    outputs: Vec<RawOutput>,
    steps: Vec<RawStep>,
    #[serde(default)]
    resources: Option<Resources>,
}

#[derive(Deserialize, Debug)]
struct RawInput {
    id: String,
    #[serde(rename = "type")]
    type_: Option<String>,
    label: Option<String>,
    doc: Option<String>,
    default: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct RawOutput {
    id: String,
    #[serde(rename = "type")]
    type_: Option<String>,
    #[serde(deserialize_with = "single_or_vec")]
    source: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct RawStep {
    id: String,
    script: Option<PathBuf>,
    requirements: Option<PathBuf>,
    apt_install: Option<Vec<String>>,
    docker_image: Option<String>,
    command: Option<String>,
    #[serde(default)]
    inputs: Option<Vec<RawStepInput>>,
    #[serde(default)]
    outputs: Option<Vec<RawStepOutput>>,
    scatter: Option<Vec<String>>,
    scatter_method: Option<ScatterMethod>,
    conda: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_version_string")]
    python_version: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawStepInput {
    id: String,
    source: Option<String>,
    #[serde(default)]
    scatter: bool,
    value_from: Option<String>,
    default: Option<Value>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawStepOutput {
    id: String,
    #[serde(flatten)]
    params: Mapping,
}

/// Deserializes either a single string or array of strings into Vec<String>
fn single_or_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected string in array")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or array of strings")),
    }
}

/// Accepts a string or an integer for version-like fields.
///
/// YAML reads an unquoted `3.10` as the float `3.1`, so fractional numbers
/// are rejected rather than silently turned into the wrong version.
fn optional_version_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Some(n.to_string())),
        Some(Value::Number(n)) => Err(de::Error::custom(format!(
            "version read as the number {}; quote it, e.g. python_version: \"3.10\"",
            n
        ))),
        Some(_) => Err(de::Error::custom("Expected a version string")),
    }
}

impl From<RawInput> for InputParam {
    fn from(raw: RawInput) -> Self {
        let mut input = InputParam::new(raw.id, raw.type_, raw.label, raw.doc);
        input.default = raw.default;
        input
    }
}

impl From<RawOutput> for OutputParam {
    fn from(raw: RawOutput) -> Self {
        OutputParam::new(raw.id, raw.type_, raw.source)
    }
}

impl From<RawStepInput> for StepInput {
    fn from(raw: RawStepInput) -> Self {
        StepInput {
            id: raw.id,
            source: raw.source,
            value_from: raw.value_from,
            scatter: raw.scatter,
            default: raw.default,
            type_: raw.type_,
        }
    }
}

impl TryFrom<RawStep> for StepSpec {
    type Error = ValidationError;

    fn try_from(raw: RawStep) -> std::result::Result<Self, Self::Error> {
        let id = raw.id.trim().to_string();

        let kind = match (raw.script, raw.docker_image) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingStepKind(id)),
            (None, None) => return Err(ValidationError::MissingStepKind(id)),
            (Some(script), None) => {
                if raw.command.is_some() {
                    warn!("Step '{}': 'command' is ignored for script-based steps", id);
                }
                StepKind::Script {
                    script,
                    dependencies: Dependencies {
                        requirements: raw.requirements,
                        apt_install: raw.apt_install.unwrap_or_default(),
                        conda: raw.conda.unwrap_or_default(),
                        python_version: raw.python_version,
                    },
                }
            }
            (None, Some(image)) => {
                let command = raw.command.as_deref().map(str::trim).unwrap_or_default();
                if command.is_empty() {
                    return Err(ValidationError::MissingCommand(id));
                }
                if raw.requirements.is_some() || raw.conda.is_some() || raw.apt_install.is_some() {
                    warn!(
                        "Step '{}': dependency fields are ignored for image-based steps",
                        id
                    );
                }
                StepKind::Image {
                    image: image.trim().to_string(),
                    command: command.to_string(),
                }
            }
        };

        let inputs: Vec<StepInput> = raw
            .inputs
            .unwrap_or_default()
            .into_iter()
            .map(StepInput::from)
            .collect();

        let mut scatter = raw.scatter.unwrap_or_default();
        for input in inputs.iter().filter(|i| i.scatter) {
            if !scatter.contains(&input.id) {
                scatter.push(input.id.clone());
            }
        }

        let outputs = raw
            .outputs
            .unwrap_or_default()
            .into_iter()
            .map(|o| StepOutput::new(o.id, o.params))
            .collect();

        Ok(StepSpec {
            id,
            kind,
            inputs,
            outputs,
            scatter,
            scatter_method: raw.scatter_method,
        })
    }
}

impl TryFrom<RawWorkflow> for WorkflowSpec {
    type Error = ValidationError;

    fn try_from(raw: RawWorkflow) -> std::result::Result<Self, Self::Error> {
        let (label, doc) = label_and_doc(&raw.id, raw.label, raw.doc);
        let steps = raw
            .steps
            .into_iter()
            .map(StepSpec::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(WorkflowSpec {
            id: raw.id,
            label,
            doc,
            inputs: raw
                .inputs
                .unwrap_or_default()
                .into_iter()
                .map(InputParam::from)
                .collect(),
            outputs: raw.outputs.into_iter().map(OutputParam::from).collect(),
            steps,
            resources: raw.resources.unwrap_or_default(),
        })
    }
}

/// Parses and validates a pipeline description from YAML text.
pub fn parse_workflow_spec(yaml_content: &str) -> Result<WorkflowSpec> {
    let raw: RawWorkflow = serde_yaml::from_str(yaml_content)?;
    let workflow = WorkflowSpec::try_from(raw)?;

    info!(
        "Parsed workflow '{}': {} inputs, {} outputs, {} steps",
        workflow.id,
        workflow.inputs.len(),
        workflow.outputs.len(),
        workflow.steps.len()
    );

    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Loads a pipeline description from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use cwlgen::workflow::load_workflow_spec;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow_spec(Path::new("config.yml"))?;
///     println!("Loaded {} steps", workflow.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow_spec(path: &Path) -> Result<WorkflowSpec> {
    info!("Loading pipeline description from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| GenerateError::io(path, e))?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_workflow_spec(&yaml_content)
}
