//! Tool Bootstrap Script
//!
//! A script-based step has no command template; its tool document is derived
//! from the script itself. The bootstrap is a shell script that installs the
//! script's dependencies into a throwaway environment and runs the
//! introspection that writes `<script stem>.cwl` next to the script.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::render_template;
use crate::error::{GenerateError, Result};
use crate::workflow::model::{Dependencies, CWL_EXTENSION};

/// Built-in bootstrap template.
pub const BUILTIN_BOOTSTRAP_TEMPLATE: &str = include_str!("../../templates/bootstrap.sh.hbs");

/// Values available to a bootstrap template.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BootstrapContext {
    pub output_dir: PathBuf,
    /// Environment name, `<step id>-venv`
    pub venv: String,
    pub requirements: Vec<String>,
    pub script_path: PathBuf,
    pub cwl_outputs_path: Option<PathBuf>,
    /// Set only when conda packages are requested
    pub conda_env: Option<String>,
    pub conda_pkgs: Vec<String>,
    pub python_version: String,
}

impl BootstrapContext {
    pub fn new(
        step_id: &str,
        output_dir: impl Into<PathBuf>,
        script_path: impl Into<PathBuf>,
        dependencies: &Dependencies,
        requirements: Vec<String>,
    ) -> Self {
        let venv = format!("{}-venv", step_id);
        Self {
            output_dir: output_dir.into(),
            conda_env: dependencies.uses_conda().then(|| venv.clone()),
            venv,
            requirements,
            script_path: script_path.into(),
            cwl_outputs_path: None,
            conda_pkgs: dependencies.conda.clone(),
            python_version: dependencies.python_version().to_string(),
        }
    }

    /// Sets the sidecar holding the declared output section.
    pub fn with_outputs(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwl_outputs_path = Some(path.into());
        self
    }
}

/// Loads a user-supplied bootstrap template.
pub fn load_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| GenerateError::io(path, e))
}

/// Renders the bootstrap script, using the built-in template unless one is given.
pub fn render_bootstrap(template: Option<&str>, context: &BootstrapContext) -> Result<String> {
    render_template(template.unwrap_or(BUILTIN_BOOTSTRAP_TEMPLATE), context)
}

/// Where the bootstrap leaves the tool document for `script`.
pub fn generated_tool_path(output_dir: &Path, script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}.{}", stem, CWL_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(deps: &Dependencies) -> BootstrapContext {
        BootstrapContext::new(
            "get_urls",
            "/out/cli/get_urls",
            "/out/cli/get_urls/get_urls.py",
            deps,
            vec!["pystac>=1.9".to_string()],
        )
        .with_outputs("/out/cli/get_urls/tool_out.yml")
    }

    #[test]
    fn test_venv_bootstrap() {
        let script = render_bootstrap(None, &context(&Dependencies::default())).unwrap();

        assert!(script.starts_with("#!/usr/bin/env bash"));
        assert!(script.contains("cd \"/out/cli/get_urls\""));
        assert!(script.contains("python3 -m venv \"get_urls-venv\""));
        assert!(script.contains("'pystac>=1.9'"));
        assert!(script.contains("--output_section \"/out/cli/get_urls/tool_out.yml\""));
        assert!(!script.contains("micromamba"));
    }

    #[test]
    fn test_conda_bootstrap() {
        let deps = Dependencies {
            conda: vec!["gdal".to_string()],
            ..Dependencies::default()
        };
        let ctx = context(&deps);
        assert_eq!(ctx.conda_env.as_deref(), Some("get_urls-venv"));

        let script = render_bootstrap(None, &ctx).unwrap();
        assert!(script.contains("micromamba create -y -n \"get_urls-venv\""));
        assert!(script.contains("python=3.12 gdal"));
        assert!(!script.contains("python3 -m venv"));
    }

    #[test]
    fn test_custom_template() {
        let ctx = context(&Dependencies::default());
        let script = render_bootstrap(Some("echo {{venv}} {{python_version}}"), &ctx).unwrap();
        assert_eq!(script, "echo get_urls-venv 3.12");
    }

    #[test]
    fn test_load_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool.sh.hbs");
        fs::write(&path, "echo {{script_path}}").unwrap();

        let template = load_template(&path).unwrap();
        let script = render_bootstrap(Some(&template), &context(&Dependencies::default())).unwrap();
        assert_eq!(script, "echo /out/cli/get_urls/get_urls.py");
    }

    #[test]
    fn test_generated_tool_path() {
        assert_eq!(
            generated_tool_path(Path::new("/out/cli/s"), Path::new("scripts/get_urls.py")),
            PathBuf::from("/out/cli/s/get_urls.cwl")
        );
    }
}
