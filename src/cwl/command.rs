//! Command Template Compiler
//!
//! Turns a shell-style command template such as
//!
//! ```text
//! stac-make --verbose --urls ${urls} -o=${out} extra
//! ```
//!
//! into an ordered list of parameter bindings. Tokens are split on
//! whitespace and scanned left to right:
//!
//! - tokens before the first placeholder form the base command, except a
//!   `-`-prefixed token directly in front of that placeholder, which is its
//!   prefix;
//! - a placeholder token is `<inline prefix>${<input id>}` and becomes a binding;
//! - any other token after the first placeholder is held as the prefix of the
//!   next placeholder. A held token that never reaches a placeholder is kept
//!   as a positioned literal.
//!
//! Positions are token indices in the original command, so the order written
//! by the pipeline author survives even though some tokens were consumed as
//! prefixes.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use crate::error::{GenerateError, Result};
use crate::workflow::model::StepInput;

/// `<optional inline prefix>${<input id>}`, anchored at the token start.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)?\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// A placeholder resolved against a declared step input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub input_id: String,
    /// Token index in the original command
    pub position: usize,
    pub prefix: Option<String>,
    /// Whether a space goes between prefix and value
    pub separate: bool,
    pub value_from: Option<String>,
    pub default: Option<Value>,
}

/// A command token passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralToken {
    pub position: usize,
    pub value: String,
}

/// Result of compiling a command template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledCommand {
    pub base_command: Vec<String>,
    pub bindings: Vec<ParameterBinding>,
    /// Tokens that are neither base command nor prefix
    pub literals: Vec<LiteralToken>,
}

impl CompiledCommand {
    /// Whether the given input is bound on the command line.
    pub fn binds(&self, input_id: &str) -> bool {
        self.bindings.iter().any(|b| b.input_id == input_id)
    }
}

/// Returns `(inline prefix, input id)` if `token` is a placeholder.
fn parse_placeholder(token: &str) -> Option<(Option<&str>, &str)> {
    PLACEHOLDER.captures(token).and_then(|caps| {
        let id = caps.get(2)?.as_str();
        Some((caps.get(1).map(|m| m.as_str()), id))
    })
}

/// Number of leading tokens that form the base command.
fn base_command_len(tokens: &[&str]) -> usize {
    match tokens.iter().position(|t| parse_placeholder(t).is_some()) {
        None => tokens.len(),
        Some(first) if first >= 2 && tokens[first - 1].starts_with('-') => first - 1,
        Some(first) => first,
    }
}

/// Compiles `command` for step `step_id`.
///
/// Every placeholder must name one of `inputs`; an unknown id fails the
/// whole step. A blank command is rejected as having no invocation.
pub fn compile_command(
    step_id: &str,
    command: &str,
    inputs: &[StepInput],
) -> Result<CompiledCommand> {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(GenerateError::NoInvocation(step_id.to_string()));
    }

    let base_len = base_command_len(&tokens);
    let mut compiled = CompiledCommand {
        base_command: tokens[..base_len].iter().map(|t| t.to_string()).collect(),
        ..CompiledCommand::default()
    };

    let mut pending: Option<LiteralToken> = None;

    for (position, token) in tokens.iter().enumerate().skip(base_len) {
        let Some((inline, input_id)) = parse_placeholder(token) else {
            let displaced = pending.replace(LiteralToken {
                position,
                value: token.to_string(),
            });
            if let Some(literal) = displaced {
                warn!(
                    "Step '{}': token '{}' is not followed by a placeholder, kept as literal",
                    step_id, literal.value
                );
                compiled.literals.push(literal);
            }
            continue;
        };

        let input = inputs
            .iter()
            .find(|i| i.id == input_id)
            .ok_or_else(|| GenerateError::UnknownInputReference {
                step: step_id.to_string(),
                input: input_id.to_string(),
            })?;

        if compiled.binds(input_id) {
            return Err(GenerateError::DuplicatePlaceholder {
                step: step_id.to_string(),
                input: input_id.to_string(),
            });
        }

        let held = pending.take().map(|literal| literal.value);
        let (prefix, separate) = match (held, inline) {
            (Some(held), Some(inline)) => (Some(format!("{} {}", held, inline)), false),
            (Some(held), None) => (Some(held), true),
            (None, Some(inline)) => (Some(inline.to_string()), false),
            (None, None) => (None, false),
        };

        let binding = ParameterBinding {
            input_id: input.id.clone(),
            position,
            prefix,
            separate,
            value_from: input.value_from.clone(),
            default: input.default.clone(),
        };
        debug!("Step '{}': bound {:?}", step_id, binding);
        compiled.bindings.push(binding);
    }

    if let Some(literal) = pending {
        warn!(
            "Step '{}': trailing token '{}' has no placeholder, kept as literal",
            step_id, literal.value
        );
        compiled.literals.push(literal);
    }

    debug!(
        "Step '{}': base command {:?}, {} bindings",
        step_id,
        compiled.base_command,
        compiled.bindings.len()
    );
    Ok(compiled)
}
