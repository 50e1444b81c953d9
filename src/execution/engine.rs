//! Generation Engine
//!
//! Orchestrates a complete generation run:
//! - Creates the `cli/<step>` output layout
//! - Builds one tool document per step, in declaration order
//! - Assembles `workflow.cwl` against the resolved tool paths
//! - Packs, normalizes and validates the workflow
//! - Publishes the tool list to the CI step output
//!
//! Any failure aborts the run. Files already written are left in place and
//! the output directory should be regenerated from scratch.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use super::output::write_action_output;
use super::tools::ToolRunner;
use crate::cwl::document::{write_yaml_value, CwlDocument};
use crate::cwl::{assemble_workflow, normalize_packed_json};
use crate::cwl::tool::{
    build_image_tool, finalize_script_tool, load_generated_tool, output_declarations,
};
use crate::environment::bootstrap::{generated_tool_path, render_bootstrap, BootstrapContext};
use crate::environment::dockerfile::{
    docker_url, read_requirements, render_dockerfile, write_dockerfile,
};
use crate::error::{GenerateError, Result};
use crate::workflow::model::{tool_path, Dependencies, StepKind, StepSpec, WorkflowSpec};

/// Directory below the output root holding every generated document.
pub const CLI_DIR: &str = "cli";

/// Workflow document written before packing.
pub const WORKFLOW_FILE: &str = "workflow.cwl";

/// Normalized packed workflow.
pub const PACKED_WORKFLOW_FILE: &str = "workflow-packed.cwl";

/// Output section handed to the bootstrap of a script-based step.
pub const TOOL_OUTPUTS_FILE: &str = "tool_out.yml";

/// Paths and outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub tools: Vec<PathBuf>,
    pub workflow: PathBuf,
    pub packed: PathBuf,
    /// False when validation was skipped
    pub validated: bool,
}

/// Generates every document for one pipeline description.
///
/// # Example
///
/// ```rust,no_run
/// use cwlgen::execution::{CwlTool, Generator};
/// use cwlgen::load_workflow_spec;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let spec = load_workflow_spec("pipeline.yaml".as_ref())?;
///     let mut generator = Generator::new(spec, CwlTool::default());
///     generator.set_output_dir("out");
///     generator.set_docker_url_base("ghcr.io/owner/repo");
///     generator.set_docker_tag("main");
///
///     let report = generator.run()?;
///     println!("{}", report.packed.display());
///     Ok(())
/// }
/// ```
pub struct Generator<R: ToolRunner> {
    spec: WorkflowSpec,
    runner: R,
    output_dir: PathBuf,
    docker_url_base: String,
    docker_tag: String,
    tool_template: Option<String>,
    skip_validation: bool,
    action_output: Option<PathBuf>,
}

impl<R: ToolRunner> Generator<R> {
    /// Creates a generator writing below the current directory.
    pub fn new(spec: WorkflowSpec, runner: R) -> Self {
        Self {
            spec,
            runner,
            output_dir: PathBuf::from("."),
            docker_url_base: String::new(),
            docker_tag: String::new(),
            tool_template: None,
            skip_validation: false,
            action_output: None,
        }
    }

    /// Sets the root of the generated layout.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
    }

    /// Sets the registry prefix of script-based step images, e.g. `ghcr.io/owner/repo`.
    pub fn set_docker_url_base(&mut self, base: impl Into<String>) {
        self.docker_url_base = base.into();
    }

    pub fn set_docker_tag(&mut self, tag: impl Into<String>) {
        self.docker_tag = tag.into();
    }

    /// Replaces the built-in bootstrap template.
    pub fn set_tool_template(&mut self, template: impl Into<String>) {
        self.tool_template = Some(template.into());
    }

    pub fn set_skip_validation(&mut self, skip: bool) {
        self.skip_validation = skip;
    }

    /// Sets the CI step-output file the tool list is appended to.
    pub fn set_action_output(&mut self, path: impl Into<PathBuf>) {
        self.action_output = Some(path.into());
    }

    /// Runs the whole generation.
    pub fn run(&self) -> Result<GenerationReport> {
        let output_dir = absolute(&self.output_dir)?;
        let cli_dir = output_dir.join(CLI_DIR);
        create_output_dirs(&cli_dir, &self.spec.step_ids())?;

        info!(
            "Generating {} steps of '{}' into {}",
            self.spec.steps.len(),
            self.spec.id,
            cli_dir.display()
        );

        let tools = self
            .spec
            .steps
            .iter()
            .map(|step| self.generate_step(step, &cli_dir))
            .collect::<Result<Vec<_>>>()?;

        let resolved = self.spec.resolve_steps(&cli_dir);
        let workflow = assemble_workflow(&self.spec, &resolved)?;
        let workflow_path = cli_dir.join(WORKFLOW_FILE);
        CwlDocument::Workflow(workflow).write(&workflow_path)?;
        info!("Wrote workflow {}", workflow_path.display());

        let packed_json = self.runner.pack(&workflow_path)?;
        let packed = normalize_packed_json(&packed_json, &self.spec.id)?;
        let packed_path = cli_dir.join(PACKED_WORKFLOW_FILE);
        write_yaml_value(&packed_path, &packed)?;
        info!("Wrote packed workflow {}", packed_path.display());

        let validated = if self.skip_validation {
            warn!("Skipping validation of {}", packed_path.display());
            false
        } else {
            if !self.runner.validate(&packed_path)? {
                return Err(GenerateError::ValidationFailed(packed_path));
            }
            info!("Packed workflow is valid");
            true
        };

        if let Some(path) = &self.action_output {
            write_action_output(path, &self.spec.step_ids())?;
        }

        Ok(GenerationReport {
            tools,
            workflow: workflow_path,
            packed: packed_path,
            validated,
        })
    }

    /// Writes the tool document of one step and returns its path.
    fn generate_step(&self, step: &StepSpec, cli_dir: &Path) -> Result<PathBuf> {
        let target = tool_path(cli_dir, &step.id);
        match &step.kind {
            StepKind::Image { image, .. } => {
                debug!("Step '{}' is image-based ({})", step.id, image);
                let tool = build_image_tool(step)?;
                CwlDocument::CommandLineTool(tool).write(&target)?;
            }
            StepKind::Script {
                script,
                dependencies,
            } => {
                debug!("Step '{}' is script-based ({})", step.id, script.display());
                self.generate_script_step(step, script, dependencies, &target)?;
            }
        }
        info!("Step '{}' -> {}", step.id, target.display());
        Ok(target)
    }

    fn generate_script_step(
        &self,
        step: &StepSpec,
        script: &Path,
        dependencies: &Dependencies,
        target: &Path,
    ) -> Result<()> {
        let step_dir = target.parent().unwrap_or(Path::new("."));
        let script_name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| GenerateError::MalformedDocument {
                path: script.to_path_buf(),
                reason: "script path has no file name".to_string(),
            })?;

        let copied = step_dir.join(&script_name);
        fs::copy(script, &copied).map_err(|e| GenerateError::io(script, e))?;

        let requirements = read_requirements(dependencies.requirements.as_deref())?;
        let dockerfile = render_dockerfile(&script_name, dependencies, &requirements)?;
        write_dockerfile(step_dir, &step.id, &dockerfile)?;

        let outputs_path = step_dir.join(TOOL_OUTPUTS_FILE);
        let mut outputs = Mapping::new();
        outputs.insert(
            Value::from("outputs"),
            Value::Mapping(output_declarations(step)),
        );
        write_yaml_value(&outputs_path, &Value::Mapping(outputs))?;

        let context =
            BootstrapContext::new(&step.id, step_dir, &copied, dependencies, requirements)
                .with_outputs(&outputs_path);
        let bootstrap = render_bootstrap(self.tool_template.as_deref(), &context)?;
        self.runner.run_script(&bootstrap, step_dir)?;

        let generated_path = generated_tool_path(step_dir, script);
        if generated_path != target {
            fs::rename(&generated_path, target)
                .map_err(|e| GenerateError::io(&generated_path, e))?;
            debug!(
                "Renamed {} to {}",
                generated_path.display(),
                target.display()
            );
        }

        let generated = load_generated_tool(target)?;
        let url = docker_url(&self.docker_url_base, &step.id, &self.docker_tag);
        let doc = finalize_script_tool(generated, step, dependencies, &url, target)?;
        write_yaml_value(target, &Value::Mapping(doc))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| GenerateError::io(path, e))?;
    Ok(cwd.join(path))
}

/// Creates `cli/` and one directory per step.
pub fn create_output_dirs(cli_dir: &Path, step_ids: &[String]) -> Result<()> {
    for id in step_ids {
        let dir = cli_dir.join(id);
        fs::create_dir_all(&dir).map_err(|e| GenerateError::io(&dir, e))?;
    }
    fs::create_dir_all(cli_dir).map_err(|e| GenerateError::io(cli_dir, e))?;
    Ok(())
}
