//! CWL Document Types
//!
//! Typed CWL v1.0 documents emitted by the generator. Field order in these
//! structs is the key order in the serialized YAML, so requirements always
//! precede parameter lists and output is reproducible.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Number, Value};

use crate::error::{GenerateError, Result};
use crate::workflow::model::{Resources, ScatterMethod};

/// CWL version written into every document.
pub const CWL_VERSION: &str = "v1.0";

/// Preferred top-level key order for tool documents read back from disk.
const DOCUMENT_KEY_ORDER: &[&str] = &[
    "class",
    "cwlVersion",
    "id",
    "label",
    "doc",
    "baseCommand",
    "arguments",
    "requirements",
    "hints",
    "inputs",
    "outputs",
];

/// A top-level CWL document.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "class")]
pub enum CwlDocument {
    CommandLineTool(CommandLineTool),
    Workflow(Workflow),
}

impl CwlDocument {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serializes the document to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_yaml(path, &self.to_yaml()?)
    }
}

/// Writes a YAML value to `path`.
pub fn write_yaml_value(path: &Path, value: &Value) -> Result<()> {
    write_yaml(path, &serde_yaml::to_string(value)?)
}

fn write_yaml(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| GenerateError::io(path, e))?;
    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// A process requirement, serialized with its `class` first.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "class")]
pub enum Requirement {
    DockerRequirement {
        #[serde(rename = "dockerPull")]
        docker_pull: String,
    },
    InlineJavascriptRequirement,
    ScatterFeatureRequirement,
    StepInputExpressionRequirement,
    MultipleInputFeatureRequirement,
    ResourceRequirement(ResourceRequirement),
}

impl Requirement {
    pub fn docker(image: impl Into<String>) -> Self {
        Self::DockerRequirement {
            docker_pull: image.into(),
        }
    }
}

/// Aggregate resource bounds; unset bounds are omitted.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_min: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_max: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_min: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_max: Option<Number>,
}

impl ResourceRequirement {
    /// Returns `None` when no bound is set, never an empty requirement.
    pub fn from_resources(resources: &Resources) -> Option<Self> {
        if resources.is_empty() {
            return None;
        }
        Some(Self {
            ram_min: resources.ram_min.clone(),
            ram_max: resources.ram_max.clone(),
            cores_min: resources.cores_min.clone(),
            cores_max: resources.cores_max.clone(),
        })
    }
}

/// A single-step tool description.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineTool {
    pub cwl_version: String,
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub base_command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CommandArgument>,
    pub requirements: Vec<Requirement>,
    pub inputs: Vec<CommandInputParameter>,
    /// Output id to opaque output declaration
    pub outputs: Mapping,
}

/// A literal command-line token at a fixed position.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandArgument {
    pub position: usize,
    pub value_from: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandInputParameter {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Absent for inputs only consumed by expressions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_binding: Option<CommandLineBinding>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandLineBinding {
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub separate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
}

/// The top-level graph tying steps together.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub cwl_version: String,
    pub id: String,
    pub label: String,
    pub doc: String,
    pub requirements: Vec<Requirement>,
    pub inputs: Vec<InputParameter>,
    pub outputs: Vec<WorkflowOutputParameter>,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputParameter {
    pub id: String,
    pub label: String,
    pub doc: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutputParameter {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub output_source: Sources,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    /// Absolute path of the step's tool document
    pub run: String,
    #[serde(rename = "in")]
    pub in_: Vec<WorkflowStepInput>,
    pub out: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter_method: Option<ScatterMethod>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStepInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// One or more upstream references. A single reference is written as a
/// plain string, several as a list.
#[derive(Debug, Clone, PartialEq)]
pub struct Sources(pub Vec<String>);

impl Sources {
    pub fn is_multiple(&self) -> bool {
        self.0.len() > 1
    }
}

impl Serialize for Sources {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => serializer.serialize_str(single),
            many => many.serialize(serializer),
        }
    }
}

/// Reorders the top-level keys of a document so that headers and
/// requirements come before parameter lists. Unknown keys keep their
/// relative order after the known ones.
pub fn canonical_key_order(mut doc: Mapping) -> Mapping {
    let mut ordered = Mapping::new();
    for key in DOCUMENT_KEY_ORDER {
        if let Some(value) = doc.shift_remove(*key) {
            ordered.insert(Value::from(*key), value);
        }
    }
    for (key, value) in doc {
        ordered.insert(key, value);
    }
    ordered
}
