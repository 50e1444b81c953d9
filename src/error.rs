//! Error Types
//!
//! A single error enum covers every way a generation run can fail. Any error
//! aborts the whole run; there is no partial-success mode.

use std::path::PathBuf;

use thiserror::Error;

use crate::workflow::validator::ValidationError;

/// Errors raised while loading a pipeline description or generating documents.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Invalid pipeline configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Step '{step}' references unknown input '{input}' in its command")]
    UnknownInputReference { step: String, input: String },

    #[error("Step '{step}' references input '{input}' more than once in its command")]
    DuplicatePlaceholder { step: String, input: String },

    #[error("Step '{0}' has no invocation (empty command)")]
    NoInvocation(String),

    #[error("Step '{0}' is not image-based")]
    NotImageStep(String),

    #[error("Step '{step}' declares an input the generated tool does not have: '{input}'")]
    MissingOverrideTarget { step: String, input: String },

    #[error("Step '{step}' run path is not absolute: {}", .path.display())]
    RunPathNotAbsolute { step: String, path: PathBuf },

    #[error("Malformed document {}: {reason}", .path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("Malformed reference in packed workflow: '{0}'")]
    MalformedReference(String),

    #[error("{tool} exited with code {code:?}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    ExternalTool {
        tool: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Packed workflow failed validation: {}", .0.display())]
    ValidationFailed(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl GenerateError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_input_display() {
        let err = GenerateError::UnknownInputReference {
            step: "fetch".to_string(),
            input: "url".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fetch"));
        assert!(msg.contains("unknown input 'url'"));
    }

    #[test]
    fn test_external_tool_display_keeps_output_verbatim() {
        let err = GenerateError::ExternalTool {
            tool: "cwltool --pack".to_string(),
            code: Some(1),
            stdout: "".to_string(),
            stderr: "Tool definition failed validation".to_string(),
        };
        assert!(err.to_string().contains("Tool definition failed validation"));
    }

    #[test]
    fn test_validation_error_converts() {
        let err: GenerateError = ValidationError::EmptyWorkflow.into();
        assert!(matches!(err, GenerateError::Validation(_)));
    }
}
