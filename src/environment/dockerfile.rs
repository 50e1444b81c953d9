//! Dockerfile Generation
//!
//! Each script-based step gets its own image: a Python (or micromamba) base,
//! optional OS and pip packages, and the script copied to `/app/app.py`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use super::render_template;
use crate::error::{GenerateError, Result};
use crate::workflow::model::Dependencies;

/// Built-in Dockerfile template.
pub const DOCKERFILE_TEMPLATE: &str = include_str!("../../templates/dockerfile.hbs");

#[derive(Serialize, Debug)]
struct DockerfileContext<'a> {
    python_version: &'a str,
    conda: &'a [String],
    apt_install: &'a [String],
    requirements: &'a [String],
    script_name: &'a str,
}

/// Reads a pip requirements file, skipping blank lines and comments.
///
/// No file means no requirements.
pub fn read_requirements(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = fs::read_to_string(path).map_err(|e| GenerateError::io(path, e))?;
    let requirements: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();
    debug!(
        "Read {} requirements from {}",
        requirements.len(),
        path.display()
    );
    Ok(requirements)
}

/// Registry pull URL of a step image: `<base>/<step_id>:<tag>`.
pub fn docker_url(base: &str, step_id: &str, tag: &str) -> String {
    format!("{}/{}:{}", base.trim_end_matches('/'), step_id, tag)
}

/// Renders the Dockerfile of a script-based step.
pub fn render_dockerfile(
    script_name: &str,
    dependencies: &Dependencies,
    requirements: &[String],
) -> Result<String> {
    let context = DockerfileContext {
        python_version: dependencies.python_version(),
        conda: &dependencies.conda,
        apt_install: &dependencies.apt_install,
        requirements,
        script_name,
    };
    render_template(DOCKERFILE_TEMPLATE, &context)
}

/// Writes `<dir>/<step_id>.Dockerfile` and returns its path.
pub fn write_dockerfile(dir: &Path, step_id: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}.Dockerfile", step_id));
    fs::write(&path, format!("{}\n", content.trim())).map_err(|e| GenerateError::io(&path, e))?;
    info!("Wrote Dockerfile {}", path.display());
    Ok(path)
}
