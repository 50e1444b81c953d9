//! Packed-Graph Normalizer
//!
//! The packer flattens the workflow and every tool document into a single
//! `$graph`, qualifying each identifier with the document it came from
//! (`#main/fetch/url`, `#fetch.cwl/url`, `file:///a/b/step1.cwl#step1`) and
//! naming the root workflow `main`. This pass walks the whole tree and turns
//! those identifiers back into the names used in the pipeline description.
//!
//! A string is treated as packed when it contains the `#` fragment marker.
//! Strings without it are only stripped of a trailing `.cwl`, so running the
//! pass on its own output changes nothing.

use log::debug;
use serde_yaml::{Mapping, Value};

use crate::error::{GenerateError, Result};

/// Root id the packer gives the top-level workflow.
pub const PACKED_ROOT_ID: &str = "main";

const FRAGMENT: char = '#';
const SEPARATOR: char = '/';
const EXTENSION_SUFFIX: &str = ".cwl";

fn strip_extension(s: &str) -> &str {
    s.strip_suffix(EXTENSION_SUFFIX).unwrap_or(s)
}

/// Terminal segment of an identifier, without its extension.
pub fn clean_id(id: &str) -> String {
    let tail = id
        .rsplit(|c: char| c == FRAGMENT || c == SEPARATOR)
        .next()
        .unwrap_or(id);
    strip_extension(tail).to_string()
}

/// `<step>/<output>` form of an upstream reference.
///
/// A packed reference (`#main/fetch/file`) loses its fragment and the
/// owning document segment. A packed reference with nothing after the
/// document segment cannot name a producer and is rejected.
pub fn clean_source(source: &str) -> Result<String> {
    let reference = match source.rsplit_once(FRAGMENT) {
        None => source,
        Some((_, fragment)) => fragment
            .split_once(SEPARATOR)
            .map(|(_, rest)| rest)
            .ok_or_else(|| GenerateError::MalformedReference(source.to_string()))?,
    };

    Ok(reference
        .split(SEPARATOR)
        .map(strip_extension)
        .collect::<Vec<_>>()
        .join("/"))
}

/// True for the packer's root id (`#main`, `file:///wf.cwl#main`), not for
/// a parameter or step that happens to be called `main`.
fn is_packed_root(id: &str) -> bool {
    id.rsplit_once(FRAGMENT)
        .is_some_and(|(_, fragment)| fragment == PACKED_ROOT_ID)
}

fn clean_scatter(id: &str) -> Result<String> {
    Ok(clean_id(id))
}

fn clean_run(run: &str, workflow_id: &str) -> String {
    if run.strip_prefix(FRAGMENT) == Some(PACKED_ROOT_ID) {
        return format!("{}{}", FRAGMENT, workflow_id);
    }
    strip_extension(run).to_string()
}

/// Applies `clean` to a string or to every string of a sequence.
fn map_strings<F>(value: Value, clean: F) -> Result<Value>
where
    F: Fn(&str) -> Result<String>,
{
    match value {
        Value::String(s) => Ok(Value::String(clean(&s)?)),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(Value::String(clean(&s)?)),
                other => Err(GenerateError::MalformedReference(format!("{:?}", other))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        other => Ok(other),
    }
}

struct Normalizer<'a> {
    workflow_id: &'a str,
}

impl Normalizer<'_> {
    fn value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Mapping(map) => self.mapping(map).map(Value::Mapping),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Tagged(mut tagged) => {
                let inner = std::mem::take(&mut tagged.value);
                tagged.value = self.value(inner)?;
                Ok(Value::Tagged(tagged))
            }
            scalar => Ok(scalar),
        }
    }

    fn mapping(&self, map: Mapping) -> Result<Mapping> {
        let mut cleaned = Mapping::with_capacity(map.len());
        for (key, value) in map {
            let value = match (key.as_str(), value) {
                (Some("id"), Value::String(id)) => Value::String(self.id(&id)),
                (Some("scatter"), value) => map_strings(value, clean_scatter)?,
                (Some("source" | "outputSource"), value) => map_strings(value, clean_source)?,
                (Some("run"), Value::String(run)) => {
                    Value::String(clean_run(&run, self.workflow_id))
                }
                (Some("out"), Value::Sequence(items)) => Value::Sequence(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(Value::String(clean_id(&s))),
                            other => self.value(other),
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                (_, value) => self.value(value)?,
            };
            cleaned.insert(key, value);
        }
        Ok(cleaned)
    }

    fn id(&self, id: &str) -> String {
        if is_packed_root(id) {
            debug!("Renaming packed root '{}' to '{}'", id, self.workflow_id);
            return self.workflow_id.to_string();
        }
        clean_id(id)
    }
}

/// Normalizes a packed document tree.
///
/// Every map value and sequence element is visited, whatever its key, so
/// step definitions nested at any depth are cleaned the same way.
pub fn normalize_packed(tree: Value, workflow_id: &str) -> Result<Value> {
    Normalizer { workflow_id }.value(tree)
}

/// Parses the packer's JSON output and normalizes it.
pub fn normalize_packed_json(json: &str, workflow_id: &str) -> Result<Value> {
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    normalize_packed(serde_yaml::to_value(parsed)?, workflow_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKED: &str = r##"{
  "$graph": [
    {
      "class": "CommandLineTool",
      "id": "#fetch.cwl",
      "baseCommand": ["wget"],
      "inputs": [{"id": "#fetch.cwl/url", "type": "string"}],
      "outputs": [{"id": "#fetch.cwl/file", "type": "File"}]
    },
    {
      "class": "Workflow",
      "id": "#main",
      "inputs": [{"id": "#main/items", "type": {"type": "array", "items": "string"}}],
      "outputs": [
        {"id": "#main/catalog", "type": "Directory", "outputSource": "#main/stage/out"},
        {
          "id": "#main/all",
          "type": "File[]",
          "outputSource": ["#main/fetch/file", "#main/stage/out"]
        }
      ],
      "steps": [
        {
          "id": "#main/fetch",
          "run": "#fetch.cwl",
          "in": [{"id": "#main/fetch/url", "source": "#main/items"}],
          "out": ["#main/fetch/file"],
          "scatter": "#main/fetch/url",
          "scatterMethod": "dotproduct"
        },
        {
          "id": "#main/stage",
          "run": "#stage.cwl",
          "in": [{"id": "#main/stage/src", "source": "#main/fetch/file"}],
          "out": [{"id": "#main/stage/out"}]
        }
      ]
    }
  ],
  "cwlVersion": "v1.0"
}"##;

    fn normalized() -> Value {
        normalize_packed_json(PACKED, "water-bodies").unwrap()
    }

    fn workflow(doc: &Value) -> &Value {
        &doc["$graph"][1]
    }

    #[test]
    fn test_root_renamed_to_workflow_id() {
        let doc = normalized();
        assert_eq!(workflow(&doc)["id"], Value::from("water-bodies"));
    }

    #[test]
    fn test_parameters_named_main_not_renamed() {
        let tree: Value = serde_yaml::from_str(
            r##"
id: "#main"
steps:
  - id: "#main/main"
    in:
      - id: "#main/split/main"
"##,
        )
        .unwrap();
        let doc = normalize_packed(tree, "water-bodies").unwrap();

        assert_eq!(doc["id"], Value::from("water-bodies"));
        assert_eq!(doc["steps"][0]["id"], Value::from("main"));
        assert_eq!(doc["steps"][0]["in"][0]["id"], Value::from("main"));

        let again = normalize_packed(doc.clone(), "water-bodies").unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_qualified_root_renamed() {
        assert!(is_packed_root("#main"));
        assert!(is_packed_root("file:///a/wf.cwl#main"));
        assert!(!is_packed_root("#main/split/main"));
        assert!(!is_packed_root("main"));
    }

    #[test]
    fn test_qualified_step_id_stripped() {
        let tree: Value = serde_yaml::from_str(
            "id: \"#main\"\nsteps:\n  - id: \"file:///a/b/step1.cwl#step1\"\n",
        )
        .unwrap();
        let doc = normalize_packed(tree, "wf").unwrap();

        assert_eq!(doc["id"], Value::from("wf"));
        assert_eq!(doc["steps"][0]["id"], Value::from("step1"));
    }

    #[test]
    fn test_ids_and_extensions_cleaned() {
        let doc = normalized();
        let tool = &doc["$graph"][0];
        assert_eq!(tool["id"], Value::from("fetch"));
        assert_eq!(tool["inputs"][0]["id"], Value::from("url"));

        let steps = &workflow(&doc)["steps"];
        assert_eq!(steps[0]["id"], Value::from("fetch"));
        assert_eq!(steps[0]["run"], Value::from("#fetch"));
        assert_eq!(steps[0]["in"][0]["id"], Value::from("url"));
        assert_eq!(steps[0]["out"][0], Value::from("file"));
        assert_eq!(steps[1]["out"][0]["id"], Value::from("out"));
    }

    #[test]
    fn test_sources_keep_producing_step() {
        let doc = normalized();
        let wf = workflow(&doc);

        assert_eq!(wf["steps"][0]["in"][0]["source"], Value::from("items"));
        assert_eq!(wf["steps"][1]["in"][0]["source"], Value::from("fetch/file"));
        assert_eq!(wf["outputs"][0]["outputSource"], Value::from("stage/out"));

        let many: Vec<&str> = wf["outputs"][1]["outputSource"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(many, vec!["fetch/file", "stage/out"]);
    }

    #[test]
    fn test_scatter_string_or_sequence() {
        let doc = normalized();
        assert_eq!(workflow(&doc)["steps"][0]["scatter"], Value::from("url"));

        let tree: Value =
            serde_yaml::from_str("scatter: [\"#main/s/a\", \"#main/s/b\"]\n").unwrap();
        let doc = normalize_packed(tree, "wf").unwrap();
        assert_eq!(
            doc["scatter"],
            serde_yaml::from_str::<Value>("[a, b]").unwrap()
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalized();
        let twice = normalize_packed(once.clone(), "water-bodies").unwrap();

        assert_eq!(
            serde_yaml::to_string(&once).unwrap(),
            serde_yaml::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_root_run_reference_redirected() {
        let tree: Value = serde_yaml::from_str("run: \"#main\"\n").unwrap();
        let doc = normalize_packed(tree, "wf").unwrap();
        assert_eq!(doc["run"], Value::from("#wf"));
    }

    #[test]
    fn test_deeply_nested_ids_cleaned() {
        let tree: Value = serde_yaml::from_str(
            "a:\n  - b:\n      - c:\n          id: \"#main/x/y.cwl\"\n",
        )
        .unwrap();
        let doc = normalize_packed(tree, "wf").unwrap();
        assert_eq!(doc["a"][0]["b"][0]["c"]["id"], Value::from("y"));
    }

    #[test]
    fn test_packed_source_without_separator_rejected() {
        let tree: Value = serde_yaml::from_str("source: \"#items\"\n").unwrap();
        let err = normalize_packed(tree, "wf").unwrap_err();
        assert!(matches!(err, GenerateError::MalformedReference(s) if s == "#items"));
    }

    #[test]
    fn test_clean_source_plain_reference() {
        assert_eq!(clean_source("items").unwrap(), "items");
        assert_eq!(clean_source("fetch/file").unwrap(), "fetch/file");
        assert_eq!(clean_source("#main/fetch.cwl/file").unwrap(), "fetch/file");
    }

    #[test]
    fn test_clean_id() {
        assert_eq!(clean_id("#main/fetch/url"), "url");
        assert_eq!(clean_id("#fetch.cwl"), "fetch");
        assert_eq!(clean_id("fetch"), "fetch");
    }
}
