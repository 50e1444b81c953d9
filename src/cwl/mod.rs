//! CWL Document Generation
//!
//! Everything between the typed pipeline model and the files written to
//! disk: command compilation, per-step tool documents, the workflow graph,
//! and the normalization of the packed graph.

pub mod assembler;
pub mod command;
pub mod document;
pub mod normalize;
pub mod tool;

pub use assembler::assemble_workflow;
pub use command::{compile_command, CompiledCommand, ParameterBinding};
pub use document::{CommandLineTool, CwlDocument, Requirement, Workflow, CWL_VERSION};
pub use normalize::{normalize_packed, normalize_packed_json};
pub use tool::{build_image_tool, finalize_script_tool};
