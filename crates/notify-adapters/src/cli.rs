use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{json, Value as Json};

use crate::adapter::{AdapterError, ChannelAdapter};

/// Serializes the payload as JSON onto a subprocess's stdin and parses its
/// stdout as JSON. A non-zero exit status is a delivery error.
pub struct CliAdapter {
    pub command: Vec<String>,
}

impl CliAdapter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl ChannelAdapter for CliAdapter {
    fn send(&self, payload: &Json) -> Result<Json, AdapterError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AdapterError::Delivery("empty adapter command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::Delivery(format!("spawn {program}: {e}")))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| AdapterError::Delivery(format!("serialize payload: {e}")))?;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(&body)
            .map_err(|e| AdapterError::Delivery(format!("write stdin: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| AdapterError::Delivery(format!("wait: {e}")))?;

        if !output.status.success() {
            return Err(AdapterError::Delivery(format!(
                "subprocess exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(json!({}));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AdapterError::Delivery(format!("parse stdout as JSON: {e}")))
    }
}
