//! CI Step Output
//!
//! When running inside a GitHub Actions job, the ids of the generated tools
//! are published as the `tools` step output so later jobs can build one
//! image per script-based step.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::error::{GenerateError, Result};

/// Environment variable naming the step-output file.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Name of the published output.
pub const TOOLS_OUTPUT: &str = "tools";

/// Formats the multiline `tools<<EOF ... EOF` block.
pub fn action_output_block(tools: &[String]) -> Result<String> {
    Ok(format!(
        "{}<<EOF\n{}\nEOF\n",
        TOOLS_OUTPUT,
        serde_json::to_string(tools)?
    ))
}

/// Appends the tool list to the step-output file at `path`.
pub fn write_action_output(path: &Path, tools: &[String]) -> Result<()> {
    let block = action_output_block(tools)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| GenerateError::io(path, e))?;
    file.write_all(block.as_bytes())
        .map_err(|e| GenerateError::io(path, e))?;
    info!("Published {} tools to {}", tools.len(), path.display());
    Ok(())
}
