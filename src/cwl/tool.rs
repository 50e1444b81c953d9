//! Step Document Builder
//!
//! Builds the standalone `CommandLineTool` document for one step.
//!
//! - Image-based steps are built entirely here from the compiled command
//!   template.
//! - Script-based steps start from the document produced by the bootstrap
//!   collaborator; [`finalize_script_tool`] rewrites its id, container
//!   reference and base command and applies the declared type overrides.
//!
//! In both cases the document id is the step id and requirements are
//! serialized before any parameter list.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_yaml::{Mapping, Value};

use super::command::{compile_command, CompiledCommand};
use super::document::{
    canonical_key_order, CommandArgument, CommandInputParameter, CommandLineBinding,
    CommandLineTool, Requirement, CWL_VERSION,
};
use crate::error::{GenerateError, Result};
use crate::workflow::model::{Dependencies, StepKind, StepSpec};

/// Type given to parameters the pipeline description does not type.
pub const DEFAULT_PARAMETER_TYPE: &str = "string";

/// Interpreter invocation of the packaged payload inside the image.
pub const SCRIPT_BASE_COMMAND: &[&str] = &["python", "/app/app.py"];

/// Entrypoint that activates the micromamba environment before the payload.
pub const ENTRYPOINT_SHIM: &str = "/usr/local/bin/_entrypoint.sh";

/// Container requirements shared by both step variants.
fn container_requirements(image: &str) -> Vec<Requirement> {
    vec![
        Requirement::docker(image),
        Requirement::InlineJavascriptRequirement,
    ]
}

/// Output declarations keyed by output id, passed through untouched.
pub fn output_declarations(step: &StepSpec) -> Mapping {
    step.outputs
        .iter()
        .map(|o| (Value::from(o.id.clone()), Value::Mapping(o.params.clone())))
        .collect()
}

fn parameter_type(step: &StepSpec, input_id: &str) -> String {
    step.get_input(input_id)
        .and_then(|i| i.type_.clone())
        .unwrap_or_else(|| DEFAULT_PARAMETER_TYPE.to_string())
}

/// Maps compiled bindings, then unreferenced declared inputs, to tool parameters.
fn tool_inputs(step: &StepSpec, compiled: &CompiledCommand) -> Vec<CommandInputParameter> {
    let mut params: Vec<CommandInputParameter> = compiled
        .bindings
        .iter()
        .map(|b| CommandInputParameter {
            id: b.input_id.clone(),
            type_: parameter_type(step, &b.input_id),
            default: b.default.clone(),
            input_binding: Some(CommandLineBinding {
                position: b.position,
                prefix: b.prefix.clone(),
                separate: b.separate,
                value_from: b.value_from.clone(),
            }),
        })
        .collect();

    for input in step.inputs.iter().filter(|i| !compiled.binds(&i.id)) {
        debug!(
            "Step '{}': input '{}' is not on the command line",
            step.id, input.id
        );
        params.push(CommandInputParameter {
            id: input.id.clone(),
            type_: parameter_type(step, &input.id),
            default: input.default.clone(),
            input_binding: None,
        });
    }

    params
}

/// Builds the tool document of an image-based step.
///
/// The first base-command token is the executable; any further base tokens
/// and unconsumed literals are emitted as positioned arguments.
pub fn build_image_tool(step: &StepSpec) -> Result<CommandLineTool> {
    let StepKind::Image { image, command } = &step.kind else {
        return Err(GenerateError::NotImageStep(step.id.clone()));
    };
    let compiled = compile_command(&step.id, command, &step.inputs)?;

    let mut arguments: Vec<CommandArgument> = compiled
        .base_command
        .iter()
        .enumerate()
        .skip(1)
        .map(|(position, token)| CommandArgument {
            position,
            value_from: token.clone(),
        })
        .collect();
    arguments.extend(compiled.literals.iter().map(|l| CommandArgument {
        position: l.position,
        value_from: l.value.clone(),
    }));
    arguments.sort_by_key(|a| a.position);

    let tool = CommandLineTool {
        cwl_version: CWL_VERSION.to_string(),
        id: step.id.clone(),
        base_command: compiled.base_command.iter().take(1).cloned().collect(),
        arguments,
        requirements: container_requirements(image),
        inputs: tool_inputs(step, &compiled),
        outputs: output_declarations(step),
    };

    info!(
        "Built tool '{}' from image {} ({} parameters)",
        tool.id,
        image,
        tool.inputs.len()
    );
    Ok(tool)
}

/// Base command of a script-based step.
pub fn script_base_command(dependencies: &Dependencies) -> Vec<String> {
    let mut command: Vec<String> = SCRIPT_BASE_COMMAND.iter().map(|s| s.to_string()).collect();
    if dependencies.uses_conda() {
        command.insert(0, ENTRYPOINT_SHIM.to_string());
    }
    command
}

/// Reads a tool document written by the bootstrap collaborator.
pub fn load_generated_tool(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| GenerateError::io(path, e))?;
    Ok(serde_yaml::from_str(&content)?)
}

/// True if a generated parameter id refers to `input_id`.
///
/// Generated ids may be bare (`x`) or qualified (`#x`, `file:///t.cwl#x`,
/// `#tool/x`).
fn parameter_matches(candidate: &str, input_id: &str) -> bool {
    candidate == input_id
        || candidate
            .rsplit(|c: char| c == '#' || c == '/')
            .next()
            .is_some_and(|tail| tail == input_id)
}

/// Sets the type of the generated parameter matching `input_id`.
///
/// Returns false when the document has no such parameter.
fn override_parameter_type(inputs: &mut Value, input_id: &str, type_: &str) -> bool {
    match inputs {
        Value::Sequence(params) => {
            for param in params.iter_mut() {
                let Value::Mapping(map) = param else { continue };
                let matches = map
                    .get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| parameter_matches(id, input_id));
                if matches {
                    map.insert(Value::from("type"), Value::from(type_));
                    return true;
                }
            }
            false
        }
        Value::Mapping(params) => {
            let key = params
                .keys()
                .find(|k| k.as_str().is_some_and(|id| parameter_matches(id, input_id)))
                .cloned();
            let Some(key) = key else { return false };
            match params.get_mut(&key) {
                Some(Value::Mapping(param)) => {
                    param.insert(Value::from("type"), Value::from(type_));
                }
                Some(other) => *other = Value::from(type_),
                None => return false,
            }
            true
        }
        _ => false,
    }
}

/// Rewrites a generated tool document for a script-based step.
///
/// - `id` becomes the step id
/// - requirements point at `docker_url`
/// - the base command invokes the packaged payload
/// - declared outputs, if any, replace the generated ones
/// - every declared type override must hit a generated parameter
pub fn finalize_script_tool(
    generated: Value,
    step: &StepSpec,
    dependencies: &Dependencies,
    docker_url: &str,
    source: &Path,
) -> Result<Mapping> {
    let Value::Mapping(mut doc) = generated else {
        return Err(GenerateError::MalformedDocument {
            path: source.to_path_buf(),
            reason: "tool document is not a mapping".to_string(),
        });
    };

    doc.insert(Value::from("id"), Value::from(step.id.clone()));
    doc.insert(
        Value::from("requirements"),
        serde_yaml::to_value(container_requirements(docker_url))?,
    );
    doc.insert(
        Value::from("baseCommand"),
        serde_yaml::to_value(script_base_command(dependencies))?,
    );
    if !step.outputs.is_empty() {
        doc.insert(
            Value::from("outputs"),
            Value::Mapping(output_declarations(step)),
        );
    }

    for input in &step.inputs {
        let Some(type_) = &input.type_ else { continue };
        let applied = doc
            .get_mut("inputs")
            .is_some_and(|inputs| override_parameter_type(inputs, &input.id, type_));
        if !applied {
            return Err(GenerateError::MissingOverrideTarget {
                step: step.id.clone(),
                input: input.id.clone(),
            });
        }
        debug!("Step '{}': input '{}' typed as {}", step.id, input.id, type_);
    }

    Ok(canonical_key_order(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cwl::document::CwlDocument;
    use crate::workflow::model::{StepInput, StepOutput};
    use std::path::PathBuf;

    fn glob_output(id: &str, glob: &str) -> StepOutput {
        let params: Mapping = serde_yaml::from_str(&format!(
            "type: Directory\noutputBinding:\n  glob: {}\n",
            glob
        ))
        .unwrap();
        StepOutput::new(id, params)
    }

    fn image_step() -> StepSpec {
        StepSpec::image("make_stac", "ghcr.io/eoap/stac:1.0", "stac-make --urls ${urls} -o=${out}")
            .with_input(StepInput::new("urls").with_type("File"))
            .with_input(StepInput::new("out").with_default("catalog"))
            .with_input(StepInput::new("tag").with_value_from("v1"))
            .with_output(glob_output("stac_catalog", "catalog"))
    }

    #[test]
    fn test_image_tool_parameters() {
        let step = image_step();
        let tool = build_image_tool(&step).unwrap();

        assert_eq!(tool.id, "make_stac");
        assert_eq!(tool.base_command, vec!["stac-make"]);
        assert_eq!(tool.requirements[0], Requirement::docker("ghcr.io/eoap/stac:1.0"));

        let urls = &tool.inputs[0];
        assert_eq!(urls.id, "urls");
        assert_eq!(urls.type_, "File");
        let binding = urls.input_binding.as_ref().unwrap();
        assert_eq!(binding.prefix.as_deref(), Some("--urls"));
        assert!(binding.separate);

        let out = &tool.inputs[1];
        assert_eq!(out.type_, "string");
        assert_eq!(out.default, Some(Value::from("catalog")));

        let tag = &tool.inputs[2];
        assert_eq!(tag.id, "tag");
        assert!(tag.input_binding.is_none());

        assert!(tool.outputs.get("stac_catalog").is_some());
    }

    #[test]
    fn test_image_tool_extra_base_tokens_become_arguments() {
        let step = StepSpec::image("s", "python:3.12", "python app.py ${a} trailing")
            .with_input(StepInput::new("a"));
        let tool = build_image_tool(&step).unwrap();

        assert_eq!(tool.base_command, vec!["python"]);
        assert_eq!(
            tool.arguments,
            vec![
                CommandArgument {
                    position: 1,
                    value_from: "app.py".to_string()
                },
                CommandArgument {
                    position: 3,
                    value_from: "trailing".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_image_tool_requires_command() {
        let step = StepSpec::image("s", "alpine", "");
        let err = build_image_tool(&step).unwrap_err();
        assert!(matches!(err, GenerateError::NoInvocation(_)));
    }

    #[test]
    fn test_image_tool_rejects_script_step() {
        let step = StepSpec::script("s", "s.py");
        let err = build_image_tool(&step).unwrap_err();
        assert!(matches!(err, GenerateError::NotImageStep(id) if id == "s"));
    }

    #[test]
    fn test_image_tool_serialized_order() {
        let step = image_step();
        let tool = build_image_tool(&step).unwrap();
        let yaml = CwlDocument::CommandLineTool(tool).to_yaml().unwrap();

        let docker = yaml.find("DockerRequirement").unwrap();
        let inputs = yaml.find("inputs:").unwrap();
        let outputs = yaml.find("outputs:").unwrap();
        assert!(docker < inputs && inputs < outputs);
        assert!(yaml.contains("id: make_stac"));
    }

    fn generated_tool() -> Value {
        serde_yaml::from_str(
            r##"
class: CommandLineTool
id: get_urls_script
inputs:
  - id: "#get_urls_script/item"
    type: string
    inputBinding:
      prefix: --item
  - id: epsg
    type: string
outputs: []
baseCommand: [get_urls.py]
cwlVersion: v1.0
"##,
        )
        .unwrap()
    }

    #[test]
    fn test_finalize_script_tool() {
        let step = StepSpec::script("get_urls", "get_urls.py")
            .with_input(StepInput::new("item").with_type("string[]"))
            .with_input(StepInput::new("epsg"))
            .with_output(glob_output("urls", "urls"));

        let doc = finalize_script_tool(
            generated_tool(),
            &step,
            &Dependencies::default(),
            "ghcr.io/owner/repo/get_urls:main",
            &PathBuf::from("get_urls.cwl"),
        )
        .unwrap();

        assert_eq!(doc.get("id"), Some(&Value::from("get_urls")));
        assert_eq!(
            doc.get("baseCommand"),
            Some(&serde_yaml::to_value(vec!["python", "/app/app.py"]).unwrap())
        );
        let item = &doc.get("inputs").unwrap().as_sequence().unwrap()[0];
        assert_eq!(item.get("type"), Some(&Value::from("string[]")));
        assert!(doc.get("outputs").unwrap().get("urls").is_some());

        let keys: Vec<&str> = doc.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            keys,
            vec!["class", "cwlVersion", "id", "baseCommand", "requirements", "inputs", "outputs"]
        );

        let requirements = serde_yaml::to_string(doc.get("requirements").unwrap()).unwrap();
        assert!(requirements.contains("dockerPull: ghcr.io/owner/repo/get_urls:main"));
    }

    #[test]
    fn test_finalize_script_tool_missing_override_target() {
        let step = StepSpec::script("get_urls", "get_urls.py")
            .with_input(StepInput::new("bbox").with_type("float[]"));

        let err = finalize_script_tool(
            generated_tool(),
            &step,
            &Dependencies::default(),
            "img",
            &PathBuf::from("get_urls.cwl"),
        )
        .unwrap_err();

        match err {
            GenerateError::MissingOverrideTarget { step, input } => {
                assert_eq!(step, "get_urls");
                assert_eq!(input, "bbox");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_finalize_script_tool_map_form_inputs() {
        let generated: Value = serde_yaml::from_str(
            "class: CommandLineTool\ninputs:\n  count: int\n  name:\n    type: string\n",
        )
        .unwrap();
        let step = StepSpec::script("s", "s.py")
            .with_input(StepInput::new("count").with_type("long"))
            .with_input(StepInput::new("name").with_type("string?"));

        let doc = finalize_script_tool(
            generated,
            &step,
            &Dependencies::default(),
            "img",
            &PathBuf::from("s.cwl"),
        )
        .unwrap();

        let inputs = doc.get("inputs").unwrap();
        assert_eq!(inputs.get("count"), Some(&Value::from("long")));
        assert_eq!(
            inputs.get("name").unwrap().get("type"),
            Some(&Value::from("string?"))
        );
    }

    #[test]
    fn test_finalize_rejects_non_mapping() {
        let step = StepSpec::script("s", "s.py");
        let err = finalize_script_tool(
            Value::from("nope"),
            &step,
            &Dependencies::default(),
            "img",
            &PathBuf::from("s.cwl"),
        )
        .unwrap_err();
        assert!(matches!(err, GenerateError::MalformedDocument { .. }));
    }

    #[test]
    fn test_conda_base_command_uses_entrypoint() {
        let deps = Dependencies {
            conda: vec!["gdal".to_string()],
            ..Dependencies::default()
        };
        assert_eq!(
            script_base_command(&deps),
            vec![ENTRYPOINT_SHIM, "python", "/app/app.py"]
        );
        assert_eq!(
            script_base_command(&Dependencies::default()),
            vec!["python", "/app/app.py"]
        );
    }

    #[test]
    fn test_parameter_matches() {
        assert!(parameter_matches("x", "x"));
        assert!(parameter_matches("#x", "x"));
        assert!(parameter_matches("file:///t/tool.cwl#x", "x"));
        assert!(parameter_matches("#tool/x", "x"));
        assert!(!parameter_matches("#tool/xy", "x"));
    }
}
