//! Per-request dispatch.
//!
//! A request moves through endpoint parsing, format and target resolution,
//! route matching, parameter validation, execution and formatting. Any
//! step may exit early with a [`DispatchError`], which is rendered in the
//! format already resolved for the request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use restapi_catalog::argtype::{parse_osd_name, validate_pgid};
use restapi_catalog::discovery::{discovery_prefix, render_help};
use restapi_catalog::{Flavor, HttpMethod, MethodSet, RouteEntry, RouteSlot, RouteTable};
use restapi_catalog::{TARGET_PLACEHOLDER, TELL_PREFIX};
use restapi_common::{
    CommandReply, CommandRequest, CommandTransport, ErrorCode, OutputFormat, Target,
    TransportError,
};

use crate::error::DispatchError;
use crate::format::{envelope, error_body};
use crate::params::QueryParams;

/// Relative route of the placement-group command family.
const PG_ROUTE: &str = "pg";
const PGID_KEY: &str = "pgid";
const FORMAT_KEY: &str = "format";
const HELP_KEY: &str = "help";
const MODULE_KEY: &str = "module";
const PERM_KEY: &str = "perm";

/// Status message for a successful command that returned none.
const DEFAULT_STATUS: &str = "OK";

/// Methods admitted on paths that match no route.
const CATCH_ALL_METHODS: [HttpMethod; 2] = [HttpMethod::Get, HttpMethod::Put];

const HTML: &str = "text/html";
const TEXT: &str = "text/plain";

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub query: QueryParams,
    /// Raw `Accept` header, if any.
    pub accept: Option<String>,
    /// Passed through to the backend as the command's input buffer.
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Build from a method and a `path?query` string.
    pub fn new(method: &str, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (uri, None),
        };
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: QueryParams::parse(query),
            ..Default::default()
        }
    }

    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// `Allow` header value for 405 responses.
    pub allow: Option<String>,
}

impl ApiResponse {
    fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            allow: None,
        }
    }

    fn error(fmt: OutputFormat, e: &DispatchError) -> Self {
        let status = ErrorCode::from(e).http_status();
        let message = e.to_string();
        let mut resp = match e {
            DispatchError::InvalidJson(_) => Self::new(status, TEXT, message.into_bytes()),
            _ => Self::new(status, fmt.content_type(), error_body(fmt, &message)),
        };
        if let DispatchError::MethodNotAllowed { allow, .. } = e {
            resp.allow = Some(allow.clone());
        }
        resp
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Where a request's command runs and why it might not.
struct ResolvedTarget {
    target: Target,
    pgid: Option<String>,
    /// Set for a malformed tell segment or pgid; reported after help.
    error: Option<DispatchError>,
}

impl Default for ResolvedTarget {
    fn default() -> Self {
        Self {
            target: Target::mon(),
            pgid: None,
            error: None,
        }
    }
}

/// Shared, read-only request handler state.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    transport: Arc<dyn CommandTransport>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        table: Arc<RouteTable>,
        transport: Arc<dyn CommandTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            table,
            transport,
            timeout,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn dispatch(&self, req: ApiRequest) -> ApiResponse {
        let (path, suffix) = split_format_suffix(&req.path);
        let path = normalize_path(path);
        let fmt = resolve_format(suffix, &req.query, req.accept.as_deref());

        match self.run(&req, &path, fmt).await {
            Ok(resp) => resp,
            Err(e) => {
                match &e {
                    DispatchError::Backend { .. } | DispatchError::Transport(_) => {
                        tracing::warn!(path = %path, error = %e, "Command failed")
                    }
                    _ => tracing::debug!(path = %path, error = %e, "Request rejected"),
                }
                ApiResponse::error(fmt, &e)
            }
        }
    }

    async fn run(
        &self,
        req: &ApiRequest,
        path: &str,
        fmt: OutputFormat,
    ) -> Result<ApiResponse, DispatchError> {
        let method = HttpMethod::parse(&req.method);
        let catch_all: MethodSet = CATCH_ALL_METHODS.into_iter().collect();

        let Some(rel) = self.table.base().strip(path) else {
            check_method(&req.method, method, &catch_all)?;
            return Err(DispatchError::OutsideBase);
        };
        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();

        let tell = segments.len() >= 2 && segments[0] == TELL_PREFIX;
        let (key, prefix) = if tell {
            let mut key_segments = segments.clone();
            key_segments[1] = TARGET_PLACEHOLDER;
            (self.route_key(&key_segments), segments[2..].join(" "))
        } else {
            (self.route_key(&segments), segments.join(" "))
        };

        let Some(slot) = self.table.get(&key) else {
            check_method(&req.method, method, &catch_all)?;
            return self.discover(rel, path);
        };
        let method = check_method(&req.method, method, slot.methods())?;
        let resolved = resolve_target(slot, &segments, tell, &req.query);

        let candidates: Vec<&RouteEntry> =
            slot.entries().iter().filter(|e| e.allows(method)).collect();

        if req.query.contains(HELP_KEY) {
            if let Some(entry) = candidates.first() {
                return Ok(help_response(&prefix, entry));
            }
        }
        if let Some(e) = resolved.error {
            return Err(e);
        }

        let (entry, mut args) = select_entry(&candidates, &req.query)?;
        args.insert(FORMAT_KEY.into(), Value::from(fmt.as_str()));
        args.insert(MODULE_KEY.into(), Value::from(entry.module.as_str()));
        args.insert(PERM_KEY.into(), Value::from(entry.permission.as_str()));
        if let Some(pgid) = resolved.pgid {
            args.insert(PGID_KEY.into(), Value::from(pgid));
        }

        let request = CommandRequest {
            prefix,
            target: resolved.target,
            args,
            inbuf: req.body.clone(),
        };
        let logged_args = Value::Object(request.args.clone());
        tracing::debug!(
            prefix = %request.prefix,
            target = %request.target,
            args = %logged_args,
            "Sending command"
        );
        let reply = self.submit(request).await?;
        if !reply.is_success() {
            return Err(DispatchError::Backend {
                status: reply.status,
                message: reply.message,
            });
        }

        let status = if reply.message.is_empty() {
            DEFAULT_STATUS
        } else {
            reply.message.as_str()
        };
        let body = envelope(fmt, &reply.output, status)?;
        Ok(ApiResponse::new(200, fmt.content_type(), body))
    }

    /// Absolute route key for relative path segments.
    fn route_key(&self, segments: &[&str]) -> String {
        format!("{}/{}", self.table.base().as_str(), segments.join("/"))
    }

    /// Help table for an unknown endpoint, or `NotFound`.
    fn discover(&self, rel: &str, path: &str) -> Result<ApiResponse, DispatchError> {
        let prefix = discovery_prefix(rel);
        match render_help(self.table.commands(), &prefix) {
            Some(html) => Ok(ApiResponse::new(
                ErrorCode::InvalidEndpointHelp.http_status(),
                HTML,
                html.into_bytes(),
            )),
            None => Err(DispatchError::UnknownEndpoint(path.to_string())),
        }
    }

    /// Run the command on a blocking thread, bounded by the call timeout.
    async fn submit(&self, request: CommandRequest) -> Result<CommandReply, DispatchError> {
        let transport = Arc::clone(&self.transport);
        let timeout = self.timeout;
        let call = tokio::task::spawn_blocking(move || transport.submit(&request, timeout));
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join)) => Err(TransportError::Unreachable(join.to_string()).into()),
            Err(_) => Err(TransportError::Timeout(timeout).into()),
        }
    }
}

/// Remove a trailing `.<format>` from the last path segment.
fn split_format_suffix(path: &str) -> (&str, Option<OutputFormat>) {
    let seg_start = path.rfind('/').map_or(0, |i| i + 1);
    if let Some(dot) = path[seg_start..].rfind('.') {
        let dot = seg_start + dot;
        if let Some(fmt) = OutputFormat::parse(&path[dot + 1..])
            .filter(|f| OutputFormat::EXPLICIT.contains(f))
        {
            return (&path[..dot], Some(fmt));
        }
    }
    (path, None)
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Path suffix, then `format=`, then `Accept`, then plain.
fn resolve_format(
    suffix: Option<OutputFormat>,
    query: &QueryParams,
    accept: Option<&str>,
) -> OutputFormat {
    suffix
        .or_else(|| query.first(FORMAT_KEY).and_then(OutputFormat::parse))
        .or_else(|| accept.and_then(format_from_accept))
        .unwrap_or_default()
}

fn format_from_accept(accept: &str) -> Option<OutputFormat> {
    let types: Vec<&str> = accept
        .split(',')
        .filter_map(|t| t.split(';').next())
        .map(str::trim)
        .collect();
    if types.contains(&"application/json") {
        Some(OutputFormat::Json)
    } else if types.contains(&"application/xml") {
        Some(OutputFormat::Xml)
    } else {
        None
    }
}

/// Admit `method` if `allowed` contains it, else 405 listing `allowed`.
fn check_method(
    raw: &str,
    method: Option<HttpMethod>,
    allowed: &MethodSet,
) -> Result<HttpMethod, DispatchError> {
    match method {
        Some(m) if allowed.contains(m) => Ok(m),
        _ => Err(DispatchError::MethodNotAllowed {
            method: raw.to_string(),
            allow: allowed.allow_header(),
        }),
    }
}

fn resolve_target(
    slot: &RouteSlot,
    segments: &[&str],
    tell: bool,
    query: &QueryParams,
) -> ResolvedTarget {
    if tell && slot.has_flavor(Flavor::TellTarget) {
        let raw = segments[1];
        return match parse_osd_name(raw) {
            Ok(id) => ResolvedTarget {
                target: Target::osd(id),
                ..Default::default()
            },
            Err(e) => ResolvedTarget {
                error: Some(DispatchError::Target {
                    target: raw.to_string(),
                    reason: e.to_string(),
                }),
                ..Default::default()
            },
        };
    }
    if segments == [PG_ROUTE] && slot.has_flavor(Flavor::PgTarget) {
        if let Some(pgid) = query.first(PGID_KEY) {
            return match validate_pgid(pgid) {
                Ok(()) => ResolvedTarget {
                    target: Target::pg(pgid),
                    pgid: Some(pgid.to_string()),
                    error: None,
                },
                Err(e) => ResolvedTarget {
                    error: Some(DispatchError::Target {
                        target: pgid.to_string(),
                        reason: e.to_string(),
                    }),
                    ..Default::default()
                },
            };
        }
    }
    ResolvedTarget::default()
}

fn help_response(prefix: &str, entry: &RouteEntry) -> ApiResponse {
    let usage = entry.param_usage();
    let sig = match (prefix.is_empty(), usage.is_empty()) {
        (_, true) => prefix.to_string(),
        (true, false) => usage,
        (false, false) => format!("{prefix} {usage}"),
    };
    ApiResponse::new(200, TEXT, format!("{sig}: {}", entry.help).into_bytes())
}

/// First candidate, in catalog order, whose parameters bind the query.
///
/// A request without bindable parameters prefers the first candidate that
/// takes none; only when there is no such candidate may one whose
/// parameters are all optional bind it.
fn select_entry<'t>(
    candidates: &[&'t RouteEntry],
    query: &QueryParams,
) -> Result<(&'t RouteEntry, Map<String, Value>), DispatchError> {
    if !query.has_bindable() {
        if let Some(entry) = candidates.iter().copied().find(|e| e.params.is_empty()) {
            return Ok((entry, Map::new()));
        }
    }

    let mut reasons = Vec::new();
    for &entry in candidates {
        match bind(entry, query) {
            Ok(args) => return Ok((entry, args)),
            Err(reason) => reasons.push(reason),
        }
    }
    Err(DispatchError::Validation(reasons.join("\n")))
}

/// Validate the query against one entry's parameter signature.
fn bind(entry: &RouteEntry, query: &QueryParams) -> Result<Map<String, Value>, String> {
    let mut args = Map::new();
    for desc in &entry.params {
        match query.get(&desc.name) {
            Some(raw) => {
                let value = desc
                    .validate(raw)
                    .map_err(|e| format!("invalid {}: {e}", desc.name))?;
                args.insert(desc.name.clone(), value);
            }
            None if desc.required => {
                return Err(format!("missing required parameter {}", desc.name));
            }
            None => {}
        }
    }

    let unused: Vec<&str> = query
        .bindable()
        .filter(|name| !entry.params.iter().any(|d| d.name == *name))
        .collect();
    if !unused.is_empty() {
        return Err(format!("unused arguments: {}", unused.join(", ")));
    }
    Ok(args)
}
