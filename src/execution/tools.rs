//! External Tool Invocation
//!
//! Generation shells out three times: the bootstrap script of every
//! script-based step, the packer, and the validator. [`ToolRunner`] is the
//! seam between the generator and those processes; [`CwlTool`] is the real
//! implementation backed by `bash` and `cwltool`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, error, info, warn};

use crate::error::{GenerateError, Result};

/// Default packer/validator binary.
pub const DEFAULT_CWLTOOL: &str = "cwltool";

/// File name the bootstrap script is written to before it runs.
const BOOTSTRAP_SCRIPT: &str = "bootstrap.sh";

/// Runs the external collaborators of a generation run.
pub trait ToolRunner {
    /// Runs a bootstrap shell script inside `working_dir`.
    fn run_script(&self, script: &str, working_dir: &Path) -> Result<()>;

    /// Packs `workflow` and returns the packer's JSON output.
    fn pack(&self, workflow: &Path) -> Result<String>;

    /// Validates `workflow`; `Ok(false)` means the document is invalid.
    fn validate(&self, workflow: &Path) -> Result<bool>;
}

/// [`ToolRunner`] backed by `bash` and a `cwltool` binary.
#[derive(Debug, Clone)]
pub struct CwlTool {
    binary: PathBuf,
}

impl CwlTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn cwltool(&self, flag: &str, workflow: &Path) -> Result<Output> {
        info!("Running {} {} {}", self.binary.display(), flag, workflow.display());
        Command::new(&self.binary)
            .arg(flag)
            .arg(workflow)
            .output()
            .map_err(|e| GenerateError::io(&self.binary, e))
    }
}

impl Default for CwlTool {
    fn default() -> Self {
        Self::new(DEFAULT_CWLTOOL)
    }
}

/// Logs a failed process's output and turns it into an error.
fn failure(tool: String, output: Output) -> GenerateError {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    error!("{} failed with exit code: {:?}", tool, output.status.code());
    if !stderr.trim().is_empty() {
        error!("stderr:\n{}", stderr);
    }
    if !stdout.trim().is_empty() {
        error!("stdout:\n{}", stdout);
    }

    GenerateError::ExternalTool {
        tool,
        code: output.status.code(),
        stdout,
        stderr,
    }
}

impl ToolRunner for CwlTool {
    fn run_script(&self, script: &str, working_dir: &Path) -> Result<()> {
        let script_path = working_dir.join(BOOTSTRAP_SCRIPT);
        fs::write(&script_path, script).map_err(|e| GenerateError::io(&script_path, e))?;

        info!("Running bootstrap in {}", working_dir.display());
        let output = Command::new("bash")
            .arg(&script_path)
            .current_dir(working_dir)
            .output()
            .map_err(|e| GenerateError::io("bash", e))?;

        if let Err(e) = fs::remove_file(&script_path) {
            warn!("Failed to clean up script {}: {}", script_path.display(), e);
        }

        if !output.status.success() {
            return Err(failure(format!("bash {}", script_path.display()), output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Bootstrap output:\n{}", stdout);
        }
        Ok(())
    }

    fn pack(&self, workflow: &Path) -> Result<String> {
        let output = self.cwltool("--pack", workflow)?;
        if !output.status.success() {
            return Err(failure(
                format!("{} --pack", self.binary.display()),
                output,
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn validate(&self, workflow: &Path) -> Result<bool> {
        let output = self.cwltool("--validate", workflow)?;
        if output.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            "{} is not valid (exit code {:?}):\n{}",
            workflow.display(),
            output.status.code(),
            stderr
        );
        Ok(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_script_in_working_dir() {
        let dir = TempDir::new().unwrap();
        CwlTool::default()
            .run_script("echo generated > tool.cwl\n", dir.path())
            .unwrap();

        let content = fs::read_to_string(dir.path().join("tool.cwl")).unwrap();
        assert_eq!(content.trim(), "generated");
        assert!(!dir.path().join(BOOTSTRAP_SCRIPT).exists());
    }

    #[test]
    fn test_run_script_failure_keeps_output() {
        let dir = TempDir::new().unwrap();
        let err = CwlTool::default()
            .run_script("echo 'no such package' >&2\nexit 3\n", dir.path())
            .unwrap_err();

        match err {
            GenerateError::ExternalTool { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("no such package"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_pack_returns_stdout() {
        let packed = CwlTool::new("echo").pack(Path::new("/out/workflow.cwl")).unwrap();
        assert_eq!(packed.trim(), "--pack /out/workflow.cwl");
    }

    #[test]
    fn test_validate_exit_status() {
        let wf = Path::new("/out/workflow-packed.cwl");
        assert!(CwlTool::new("true").validate(wf).unwrap());
        assert!(!CwlTool::new("false").validate(wf).unwrap());
    }

    #[test]
    fn test_missing_binary_is_io_error() {
        let err = CwlTool::new("/nonexistent/cwltool")
            .pack(Path::new("wf.cwl"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Io { .. }));
    }
}
