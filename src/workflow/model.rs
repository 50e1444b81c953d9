//! Pipeline Data Model
//!
//! Typed, immutable representation of a pipeline description. Values are
//! built once by the parser and discarded when generation completes.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: water-bodies
//! label: Water bodies detection
//! inputs:
//!   - id: stac_items
//!     type: string[]
//! outputs:
//!   - id: stac_catalog
//!     type: Directory
//!     source: make_stac/stac_catalog
//! steps:
//!   - id: get_urls
//!     script: scripts/get_urls.py
//!     requirements: scripts/requirements.txt
//!     inputs:
//!       - id: item
//!         source: stac_items
//!         scatter: true
//!     outputs:
//!       - id: urls
//!         type: File
//!         outputBinding:
//!           glob: urls.txt
//!   - id: make_stac
//!     docker_image: ghcr.io/eoap/stac:1.0
//!     command: stac-make --urls ${urls} -o ${out}
//!     inputs:
//!       - id: urls
//!         source: get_urls/urls
//!       - id: out
//!         default: catalog
//!     outputs:
//!       - id: stac_catalog
//!         type: Directory
//!         outputBinding:
//!           glob: catalog
//! resources:
//!   ram_min: 4096
//!   cores_min: 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value};

/// Default type of a workflow input when none is declared.
pub const DEFAULT_INPUT_TYPE: &str = "string";

/// Default type of a workflow output when none is declared.
pub const DEFAULT_OUTPUT_TYPE: &str = "Directory";

/// Default interpreter version for script-based steps.
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// File extension of every emitted CWL document.
pub const CWL_EXTENSION: &str = "cwl";

/// A complete pipeline: workflow-level parameters plus its ordered steps.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSpec {
    /// Used verbatim as the workflow document id
    pub id: String,
    pub label: String,
    pub doc: String,
    pub inputs: Vec<InputParam>,
    pub outputs: Vec<OutputParam>,
    pub steps: Vec<StepSpec>,
    pub resources: Resources,
}

impl WorkflowSpec {
    /// Creates a workflow with no parameters or steps.
    ///
    /// Label and doc both fall back to the id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            doc: id.clone(),
            id,
            inputs: Vec::new(),
            outputs: Vec::new(),
            steps: Vec::new(),
            resources: Resources::default(),
        }
    }

    /// Adds a workflow-level input.
    pub fn with_input(mut self, input: InputParam) -> Self {
        self.inputs.push(input);
        self
    }

    /// Adds a workflow-level output.
    pub fn with_output(mut self, output: OutputParam) -> Self {
        self.outputs.push(output);
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Gets a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step ids in declaration order.
    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    /// Pairs every step with the path its tool document is written to.
    pub fn resolve_steps(&self, cli_dir: &Path) -> Vec<ResolvedStepSpec<'_>> {
        self.steps.iter().map(|s| resolve(s, cli_dir)).collect()
    }
}

/// Optional aggregate resource bounds for the whole workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Resources {
    #[serde(default)]
    pub ram_min: Option<Number>,
    #[serde(default)]
    pub ram_max: Option<Number>,
    #[serde(default)]
    pub cores_min: Option<Number>,
    #[serde(default)]
    pub cores_max: Option<Number>,
}

impl Resources {
    /// True when no bound is set.
    pub fn is_empty(&self) -> bool {
        self.ram_min.is_none()
            && self.ram_max.is_none()
            && self.cores_min.is_none()
            && self.cores_max.is_none()
    }
}

/// A workflow-level input parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParam {
    pub id: String,
    pub type_: String,
    pub label: String,
    pub doc: String,
    pub default: Option<Value>,
}

impl InputParam {
    /// Builds an input; missing label and doc default to each other, then to the id.
    pub fn new(
        id: impl Into<String>,
        type_: Option<String>,
        label: Option<String>,
        doc: Option<String>,
    ) -> Self {
        let id = id.into();
        let (label, doc) = label_and_doc(&id, label, doc);
        Self {
            type_: type_.unwrap_or_else(|| DEFAULT_INPUT_TYPE.to_string()),
            label,
            doc,
            id,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A workflow-level output and the upstream locations feeding it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputParam {
    pub id: String,
    pub type_: String,
    /// Always at least one reference, e.g. `make_stac/stac_catalog`
    pub source: Vec<String>,
}

impl OutputParam {
    pub fn new(id: impl Into<String>, type_: Option<String>, source: Vec<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.unwrap_or_else(|| DEFAULT_OUTPUT_TYPE.to_string()),
            source,
        }
    }
}

/// How the scattered inputs of a step are combined.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScatterMethod {
    #[default]
    #[serde(rename = "dotproduct", alias = "dot-product", alias = "dot_product")]
    DotProduct,
    #[serde(rename = "nested_crossproduct", alias = "nested-crossproduct")]
    NestedCrossProduct,
    #[serde(rename = "flat_crossproduct", alias = "flat-crossproduct")]
    FlatCrossProduct,
}

/// The two ways a step can be turned into a tool document.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// A script packaged into a generated container image.
    Script {
        script: PathBuf,
        dependencies: Dependencies,
    },
    /// A pre-built container image invoked with a command template.
    Image { image: String, command: String },
}

/// Packages a script-based step needs inside its container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dependencies {
    /// pip requirements file
    pub requirements: Option<PathBuf>,
    pub apt_install: Vec<String>,
    /// Non-empty switches the image to a micromamba-managed environment
    pub conda: Vec<String>,
    pub python_version: Option<String>,
}

impl Dependencies {
    pub fn uses_conda(&self) -> bool {
        !self.conda.is_empty()
    }

    pub fn python_version(&self) -> &str {
        self.python_version
            .as_deref()
            .unwrap_or(DEFAULT_PYTHON_VERSION)
    }
}

/// A single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub id: String,
    pub kind: StepKind,
    pub inputs: Vec<StepInput>,
    pub outputs: Vec<StepOutput>,
    /// Ids of inputs iterated over; always a subset of `inputs`
    pub scatter: Vec<String>,
    /// Explicit method, if the description set one
    pub scatter_method: Option<ScatterMethod>,
}

impl StepSpec {
    /// Creates an image-based step.
    ///
    /// # Example
    ///
    /// ```
    /// use cwlgen::workflow::{StepInput, StepSpec};
    ///
    /// let step = StepSpec::image("stage", "alpine:3.19", "cp ${src} ${dst}")
    ///     .with_input(StepInput::new("src"))
    ///     .with_input(StepInput::new("dst"));
    /// assert_eq!(step.inputs.len(), 2);
    /// ```
    pub fn image(
        id: impl Into<String>,
        image: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            id,
            StepKind::Image {
                image: image.into().trim().to_string(),
                command: command.into().trim().to_string(),
            },
        )
    }

    /// Creates a script-based step with no extra dependencies.
    pub fn script(id: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self::with_kind(
            id,
            StepKind::Script {
                script: script.into(),
                dependencies: Dependencies::default(),
            },
        )
    }

    fn with_kind(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into().trim().to_string(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            scatter: Vec::new(),
            scatter_method: None,
        }
    }

    pub fn with_input(mut self, input: StepInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: StepOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Scatters over the given input.
    pub fn scatter_over(mut self, input_id: impl Into<String>) -> Self {
        self.scatter.push(input_id.into());
        self
    }

    pub fn with_scatter_method(mut self, method: ScatterMethod) -> Self {
        self.scatter_method = Some(method);
        self
    }

    /// Gets a declared input by ID.
    pub fn get_input(&self, id: &str) -> Option<&StepInput> {
        self.inputs.iter().find(|i| i.id == id)
    }

    /// Effective scatter method: none unless the step scatters, dot-product by default.
    pub fn resolved_scatter_method(&self) -> Option<ScatterMethod> {
        if self.scatter.is_empty() {
            None
        } else {
            Some(self.scatter_method.unwrap_or_default())
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self.kind, StepKind::Script { .. })
    }
}

/// An input edge of a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInput {
    pub id: String,
    /// Upstream reference, e.g. `get_urls/urls` or a workflow input id
    pub source: Option<String>,
    /// Expression computing the value
    pub value_from: Option<String>,
    pub scatter: bool,
    pub default: Option<Value>,
    /// Corrects the type inferred for the generated tool parameter
    pub type_: Option<String>,
}

impl StepInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_value_from(mut self, expr: impl Into<String>) -> Self {
        self.value_from = Some(expr.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }
}

/// An output of a step. `params` is passed through to the tool untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    pub id: String,
    pub params: Mapping,
}

impl StepOutput {
    pub fn new(id: impl Into<String>, params: Mapping) -> Self {
        Self {
            id: id.into(),
            params,
        }
    }
}

/// A step paired with the absolute path of its generated tool document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStepSpec<'a> {
    pub step: &'a StepSpec,
    pub run: PathBuf,
}

/// Location of a step's tool document below the `cli` directory.
pub fn tool_path(cli_dir: &Path, step_id: &str) -> PathBuf {
    cli_dir
        .join(step_id)
        .join(format!("{}.{}", step_id, CWL_EXTENSION))
}

/// Attaches the tool document path to a step once the output directory is known.
pub fn resolve<'a>(step: &'a StepSpec, cli_dir: &Path) -> ResolvedStepSpec<'a> {
    ResolvedStepSpec {
        step,
        run: tool_path(cli_dir, &step.id),
    }
}

/// Label and doc default to each other, then to the id.
pub(crate) fn label_and_doc(
    id: &str,
    label: Option<String>,
    doc: Option<String>,
) -> (String, String) {
    let label_out = label
        .clone()
        .or_else(|| doc.clone())
        .unwrap_or_else(|| id.to_string());
    let doc_out = doc.or(label).unwrap_or_else(|| id.to_string());
    (label_out, doc_out)
}
