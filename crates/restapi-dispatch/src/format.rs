//! Response envelopes.
//!
//! JSON output is parsed and re-wrapped; XML output is embedded verbatim
//! with only the status text escaped.

use restapi_common::OutputFormat;
use serde_json::Value;

use crate::error::DispatchError;

/// Wrap backend `output` and a status message in the envelope for `fmt`.
///
/// Plain output passes through untouched. An empty JSON output becomes
/// `[]`; output that is not JSON when JSON was asked for is an error.
pub fn envelope(fmt: OutputFormat, output: &[u8], status: &str) -> Result<Vec<u8>, DispatchError> {
    if fmt.is_json() {
        let parsed: Value = if output.iter().all(u8::is_ascii_whitespace) {
            Value::Array(Vec::new())
        } else {
            serde_json::from_slice(output).map_err(|_| {
                DispatchError::InvalidJson(String::from_utf8_lossy(output).into_owned())
            })?
        };
        let body = serde_json::json!({ "output": parsed, "status": status });
        return serde_json::to_vec(&body)
            .map_err(|_| DispatchError::InvalidJson(String::from_utf8_lossy(output).into_owned()));
    }
    if fmt.is_xml() {
        let body = format!(
            "\n<response>\n  <output>\n    {}\n  </output>\n  <status>\n    {}\n  </status>\n</response>",
            String::from_utf8_lossy(output),
            escape_xml(status)
        );
        return Ok(body.into_bytes());
    }
    Ok(output.to_vec())
}

/// Body for a failed request: the error text as status, no output.
///
/// Plain requests get the error text itself so the client sees why.
pub fn error_body(fmt: OutputFormat, message: &str) -> Vec<u8> {
    match fmt {
        OutputFormat::Plain => message.as_bytes().to_vec(),
        _ => envelope(fmt, b"", message).unwrap_or_else(|_| message.as_bytes().to_vec()),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
