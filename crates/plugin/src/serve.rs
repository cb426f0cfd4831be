#![forbid(unsafe_code)]

//! Newline-delimited JSON framing for `bc_cache`: one request per input line, one
//! response per output line.

use std::io::{BufRead, Write};

use bc_storage::VoteStore;
use serde::{Deserialize, Serialize};

use crate::{BallotPlugin, PluginDriver, PluginError};

#[derive(Debug, Deserialize)]
pub struct Frame {
    pub cmd: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub reply: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    fn ok(reply: String) -> Self {
        Self {
            ok: true,
            reply: Some(reply),
            code: None,
            message: None,
        }
    }

    fn error(code: &str, message: String) -> Self {
        Self {
            ok: false,
            reply: None,
            code: Some(code.to_string()),
            message: Some(message),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Input closed.
    Eof,
    /// A fatal error was answered and serving stopped.
    Fatal,
}

/// Handles one frame. The administrative frames `build`, `record`, `check-version` and
/// `setup` are handled here; everything else goes through [`PluginDriver::exec`].
pub fn handle_frame<S: VoteStore>(
    plugin: &BallotPlugin<S>,
    frame: &Frame,
) -> Result<String, PluginError> {
    match frame.cmd.trim() {
        "build" => plugin.build(&frame.payload).map(|()| String::new()),
        "record" => plugin.put_record(&frame.payload).map(|()| String::new()),
        "check-version" => plugin.version_reply(),
        "setup" => plugin.setup().map(|()| String::new()),
        _ => plugin.exec(&frame.cmd, &frame.payload, &frame.reply),
    }
}

pub fn serve<S: VoteStore>(
    plugin: &BallotPlugin<S>,
    input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<ServeOutcome> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (response, fatal) = match serde_json::from_str::<Frame>(&line) {
            Ok(frame) => match handle_frame(plugin, &frame) {
                Ok(reply) => (Response::ok(reply), false),
                Err(err) => {
                    if err.is_not_found() {
                        tracing::debug!(cmd = %frame.cmd, error = %err, "not found");
                    } else if err.is_fatal() {
                        tracing::error!(cmd = %frame.cmd, error = %err, "fatal cache error");
                    } else {
                        tracing::warn!(cmd = %frame.cmd, error = %err, "command failed");
                    }
                    (Response::error(err.code(), err.to_string()), err.is_fatal())
                }
            },
            Err(err) => (Response::error("DECODE", format!("frame: {err}")), false),
        };

        let encoded = serde_json::to_string(&response).map_err(std::io::Error::other)?;
        writeln!(output, "{encoded}")?;
        output.flush()?;

        if fatal {
            return Ok(ServeOutcome::Fatal);
        }
    }
    Ok(ServeOutcome::Eof)
}
