//! Console bus: stdin lines in, outbound envelopes out on stdout.
//!
//! Input lines are `<topic> <payload>`. Two directives stand in for
//! network events: `@join <ieee>` and `@state <ieee> <json object>`.
//! Blank lines and lines starting with `#` are skipped.

use std::io::Write;

use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use thiserror::Error;

use zigbridge_core::{Inbound, IeeeAddr, Outbound};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Message(Inbound),
    Join(IeeeAddr),
    State(IeeeAddr, Map<String, Value>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown directive '@{0}'")]
    UnknownDirective(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid IEEE address '{0}'")]
    Address(String),

    #[error("state must be a JSON object: {0}")]
    State(String),
}

/// Parse one input line. `Ok(None)` for lines that carry nothing.
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, InputError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let Some(directive) = line.strip_prefix('@') else {
        let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
        return Ok(Some(ConsoleInput::Message(Inbound::new(topic, payload))));
    };

    let (name, rest) = directive.split_once(' ').unwrap_or((directive, ""));
    let rest = rest.trim();
    match name {
        "join" => Ok(Some(ConsoleInput::Join(address(rest)?))),
        "state" => {
            let (raw_addr, raw_state) = rest.split_once(' ').ok_or(InputError::Missing("state"))?;
            let state = match serde_json::from_str(raw_state.trim()) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(InputError::State(other.to_string())),
                Err(e) => return Err(InputError::State(e.to_string())),
            };
            Ok(Some(ConsoleInput::State(address(raw_addr)?, state)))
        }
        other => Err(InputError::UnknownDirective(other.to_owned())),
    }
}

fn address(raw: &str) -> Result<IeeeAddr, InputError> {
    if raw.is_empty() {
        return Err(InputError::Missing("IEEE address"));
    }
    raw.parse().map_err(|_| InputError::Address(raw.to_owned()))
}

/// Writes outbound envelopes, one per line: `<topic> <payload>`.
pub struct Printer {
    color: bool,
}

impl Printer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn render(&self, message: &Outbound) -> String {
        let retained = if message.options.retain {
            " (retained)"
        } else {
            ""
        };
        if self.color {
            format!(
                "{} {}{}",
                message.topic.cyan(),
                message.payload,
                retained.dimmed()
            )
        } else {
            format!("{} {}{retained}", message.topic, message.payload)
        }
    }

    pub fn print(&self, out: &mut impl Write, message: &Outbound) -> std::io::Result<()> {
        writeln!(out, "{}", self.render(message))?;
        out.flush()
    }
}
