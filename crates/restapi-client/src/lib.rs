//! HTTP transport to the backend administrative system.
//!
//! Uses blocking `ureq`; the dispatcher runs calls on a blocking thread.
//! Commands are POSTed as JSON to `<endpoint>/command`, one endpoint per
//! call chosen round-robin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use restapi_common::{CommandReply, CommandRequest, CommandTransport, Target, TransportError};

/// TCP connection timeout; the per-call timeout bounds the whole exchange.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Path, relative to an endpoint, that accepts commands.
const COMMAND_PATH: &str = "/command";

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    prefix: &'a str,
    target: &'a Target,
    args: &'a Map<String, Value>,
    /// Request body, base64.
    inbuf: String,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    status: i32,
    /// Command output, base64.
    #[serde(default)]
    output: String,
    #[serde(default)]
    message: String,
}

pub struct HttpTransport {
    endpoints: Vec<String>,
    counter: AtomicUsize,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.as_ref().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Self {
            endpoints,
            counter: AtomicUsize::new(0),
            agent,
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Next endpoint in rotation.
    fn next_endpoint(&self) -> Result<&str, TransportError> {
        if self.endpoints.is_empty() {
            tracing::error!("endpoints not configured for backend");
            return Err(TransportError::NotConfigured);
        }
        let i = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(&self.endpoints[i % self.endpoints.len()])
    }
}

impl CommandTransport for HttpTransport {
    fn submit(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandReply, TransportError> {
        let endpoint = self.next_endpoint()?;
        let url = format!("{endpoint}{COMMAND_PATH}");
        let body = WireRequest {
            prefix: &request.prefix,
            target: &request.target,
            args: &request.args,
            inbuf: base64::engine::general_purpose::STANDARD.encode(&request.inbuf),
        };
        let body = serde_json::to_value(&body).map_err(|e| TransportError::Decode(e.to_string()))?;

        tracing::debug!(%url, prefix = %request.prefix, target = %request.target, "Submitting command");
        let resp = self
            .agent
            .post(&url)
            .timeout(timeout)
            .send_json(body)
            .map_err(|e| map_error(e, timeout))?;
        let reply: WireReply = resp
            .into_json()
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        reply.into_command_reply()
    }
}

impl WireReply {
    fn into_command_reply(self) -> Result<CommandReply, TransportError> {
        let output = base64::engine::general_purpose::STANDARD
            .decode(self.output.as_bytes())
            .map_err(|e| TransportError::Decode(format!("command output: {e}")))?;
        Ok(CommandReply {
            status: self.status,
            output,
            message: self.message,
        })
    }
}

fn map_error(e: ureq::Error, timeout: Duration) -> TransportError {
    match e {
        ureq::Error::Status(status, resp) => TransportError::Http {
            status,
            message: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => {
            let timed_out = std::error::Error::source(&t)
                .and_then(|s| s.downcast_ref::<std::io::Error>())
                .is_some_and(|io| {
                    matches!(
                        io.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    )
                });
            if timed_out {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Unreachable(t.to_string())
            }
        }
    }
}
