//! cwlgen - CWL Workflow Generator
//!
//! Turns a declarative pipeline description into a CWL v1.0 workflow plus
//! one `CommandLineTool` document per step, ready for an external CWL
//! runner. Nothing is executed here beyond the packaging helpers
//! (bootstrap scripts, `cwltool --pack`, `cwltool --validate`).
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`workflow`]: Data structures and parsing for pipeline descriptions
//! - [`cwl`]: Command compilation, tool and workflow documents, packed-graph normalization
//! - [`environment`]: Dockerfile and bootstrap-script rendering for script-based steps
//! - [`execution`]: The generation engine and its external tools
//! - [`error`]: Error taxonomy shared by all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use cwlgen::execution::{CwlTool, Generator};
//! use cwlgen::load_workflow_spec;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load a pipeline description from YAML
//!     let spec = load_workflow_spec("pipeline.yaml".as_ref())?;
//!
//!     // Create the generator
//!     let mut generator = Generator::new(spec, CwlTool::default());
//!     generator.set_output_dir("out");
//!     generator.set_docker_url_base("ghcr.io/owner/repo");
//!     generator.set_docker_tag("main");
//!
//!     // Write every document
//!     generator.run()?;
//!     Ok(())
//! }
//! ```

pub mod cwl;
pub mod environment;
pub mod error;
pub mod execution;
pub mod workflow;

// Re-export commonly used types
pub use error::{GenerateError, Result};
pub use execution::engine::Generator;
pub use workflow::model::{StepSpec, WorkflowSpec};
pub use workflow::parser::load_workflow_spec;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cwlgen";
