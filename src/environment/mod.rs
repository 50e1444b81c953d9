//! Container Environment Module
//!
//! Renders the files that package a script-based step: the Dockerfile of
//! its image and the shell bootstrap that derives its tool document.
//! Both are handlebars templates rendered without HTML escaping, since the
//! output is shell and Dockerfile text.

pub mod bootstrap;
pub mod dockerfile;

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::Result;

pub use bootstrap::{render_bootstrap, BootstrapContext, BUILTIN_BOOTSTRAP_TEMPLATE};
pub use dockerfile::{docker_url, read_requirements, render_dockerfile, write_dockerfile};

/// Renders `template` against `context`.
pub(crate) fn render_template<T: Serialize>(template: &str, context: &T) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(handlebars::no_escape);
    Ok(handlebars.render_template(template, context)?)
}
