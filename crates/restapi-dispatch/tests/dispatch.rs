use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use restapi_catalog::descriptor::{parse_descriptions, REST_CONSUMER};
use restapi_catalog::{BasePath, Catalog, RouteTable};
use restapi_common::{
    CommandReply, CommandRequest, CommandTransport, Role, Target, TransportError,
};
use restapi_dispatch::{http, ApiRequest, Dispatcher};

const MON_COMMANDS: &str = r#"{
    "cmd0": {"sig": ["status"], "help": "show cluster status", "module": "mon", "perm": "r", "avail": "cli,rest"},
    "cmd1": {"sig": ["osd", "pool", "set",
                     {"name": "pool", "type": "CephPoolname"},
                     {"name": "var", "type": "CephChoices", "strings": "size|min_size"},
                     {"name": "val", "type": "CephString"}],
             "help": "set pool parameter <var> to <val>", "module": "osd", "perm": "w"},
    "cmd2": {"sig": ["osd", "pool", "stats", {"name": "name", "type": "CephString", "req": "false"}],
             "help": "obtain stats from all pools", "module": "osd", "perm": "r"},
    "cmd3": {"sig": ["mon", "dump", {"name": "epoch", "type": "CephInt", "range": "0", "req": false}],
             "help": "dump formatted monmap", "module": "mon_epoch", "perm": "r"},
    "cmd4": {"sig": ["mon", "dump"], "help": "dump current monmap", "module": "mon_current", "perm": "r"},
    "cmd5": {"sig": ["auth", "caps", {"name": "entity", "type": "CephName"}],
             "help": "show caps", "module": "auth", "perm": "r"},
    "cmd6": {"sig": ["auth", "caps", {"name": "entity", "type": "CephName"},
                     {"name": "caps", "type": "CephString", "n": "N"}],
             "help": "update caps", "module": "auth", "perm": "w"},
    "cmd7": {"sig": ["osd", "pool", "rmsnap"], "help": "cli only", "module": "osd", "perm": "rw", "avail": "cli"}
}"#;

const OSD_COMMANDS: &str = r#"{
    "cmd0": {"sig": ["bench", {"name": "count", "type": "CephInt", "req": "false"}],
             "help": "run OSD benchmark", "module": "osd", "perm": "rw"},
    "cmd1": {"sig": ["pg", {"name": "pgid", "type": "CephPgid"},
                     {"name": "cmd", "type": "CephChoices", "strings": "query"}],
             "help": "show details of a specific pg", "module": "pg", "perm": "r"}
}"#;

/// In-memory backend: replies are scripted by command prefix; every
/// submitted request is recorded.
#[derive(Default)]
struct FakeBackend {
    replies: Mutex<HashMap<String, CommandReply>>,
    unreachable: bool,
    /// Blocks each call this long before answering.
    delay: Option<Duration>,
    seen: Mutex<Vec<CommandRequest>>,
}

impl FakeBackend {
    fn reply(&self, prefix: &str, reply: CommandReply) {
        self.replies.lock().unwrap().insert(prefix.to_string(), reply);
    }

    fn last(&self) -> CommandRequest {
        self.seen.lock().unwrap().last().cloned().expect("no command submitted")
    }

    fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl CommandTransport for FakeBackend {
    fn submit(
        &self,
        request: &CommandRequest,
        _timeout: Duration,
    ) -> Result<CommandReply, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.unreachable {
            return Err(TransportError::Unreachable("connection refused".into()));
        }
        Ok(self
            .replies
            .lock()
            .unwrap()
            .get(&request.prefix)
            .cloned()
            .unwrap_or_else(|| CommandReply::ok("", "")))
    }
}

fn route_table() -> RouteTable {
    let mon = parse_descriptions(MON_COMMANDS.as_bytes(), REST_CONSUMER).unwrap();
    let osd = parse_descriptions(OSD_COMMANDS.as_bytes(), REST_CONSUMER).unwrap();
    let mut catalog = Catalog::from_primary(mon);
    catalog.merge_secondary(osd);
    RouteTable::build(BasePath::new("/api/v0.1"), &catalog)
}

fn setup() -> (Arc<FakeBackend>, Dispatcher) {
    setup_with(FakeBackend::default())
}

fn setup_with(backend: FakeBackend) -> (Arc<FakeBackend>, Dispatcher) {
    setup_with_timeout(backend, Duration::from_secs(5))
}

fn setup_with_timeout(backend: FakeBackend, timeout: Duration) -> (Arc<FakeBackend>, Dispatcher) {
    let backend = Arc::new(backend);
    let transport: Arc<dyn CommandTransport> = backend.clone();
    let dispatcher = Dispatcher::new(Arc::new(route_table()), transport, timeout);
    (backend, dispatcher)
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

// ── Status and parameter binding ────────────────────────────────────

#[tokio::test]
async fn status_get_without_params_runs_on_monitors() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok("HEALTH_OK", ""));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "text/plain");
    assert_eq!(resp.body_text(), "HEALTH_OK");

    let sent = backend.last();
    assert_eq!(sent.prefix, "status");
    assert_eq!(sent.target, Target::mon());
    assert_eq!(sent.args["format"], "plain");
    assert_eq!(sent.args["module"], "mon");
    assert_eq!(sent.args["perm"], "r");
}

#[tokio::test]
async fn status_get_with_any_param_fails_validation() {
    let (backend, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status?detail=1")).await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("unused arguments: detail"), "{}", resp.body_text());
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn missing_required_param_is_named() {
    let (backend, d) = setup();
    let resp = d
        .dispatch(ApiRequest::new("PUT", "/api/v0.1/osd/pool/set?pool=rbd&val=3"))
        .await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("var"), "{}", resp.body_text());
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn pool_set_binds_typed_params_and_body() {
    let (backend, d) = setup();
    let req = ApiRequest::new("PUT", "/api/v0.1/osd/pool/set?pool=rbd&var=size&val=3")
        .with_body(b"payload".to_vec());
    let resp = d.dispatch(req).await;
    assert_eq!(resp.status, 200);

    let sent = backend.last();
    assert_eq!(sent.prefix, "osd pool set");
    assert_eq!(sent.args["pool"], "rbd");
    assert_eq!(sent.args["var"], "size");
    assert_eq!(sent.args["val"], "3");
    assert_eq!(sent.args["perm"], "w");
    assert_eq!(sent.inbuf, b"payload");
}

#[tokio::test]
async fn invalid_choice_reports_the_reason() {
    let (_, d) = setup();
    let resp = d
        .dispatch(ApiRequest::new("PUT", "/api/v0.1/osd/pool/set?pool=rbd&var=crush&val=3"))
        .await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("crush"), "{}", resp.body_text());
}

// ── Formats ─────────────────────────────────────────────────────────

#[tokio::test]
async fn json_suffix_wraps_empty_output_in_list() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok("", "nothing to report"));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status.json")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "application/json");
    assert_eq!(
        json_body(&resp.body),
        json!({"output": [], "status": "nothing to report"})
    );
    assert_eq!(backend.last().args["format"], "json");
}

#[tokio::test]
async fn accept_header_selects_json_and_status_defaults_to_ok() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok(r#"{"health": "HEALTH_OK"}"#, ""));

    let req = ApiRequest::new("GET", "/api/v0.1/status").with_accept("application/json");
    let resp = d.dispatch(req).await;
    let body = json_body(&resp.body);
    assert_eq!(body["output"]["health"], "HEALTH_OK");
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn pretty_suffix_is_passed_to_backend_and_stripped_from_content_type() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok("[]", ""));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status.json-pretty")).await;
    assert_eq!(resp.content_type, "application/json");
    assert_eq!(backend.last().args["format"], "json-pretty");
}

#[tokio::test]
async fn xml_envelope_escapes_only_the_status() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok("<health>ok</health>", "a & b"));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status?format=xml")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "application/xml");
    let text = resp.body_text();
    assert!(text.contains("<output>\n    <health>ok</health>\n  </output>"), "{text}");
    assert!(text.contains("a &amp; b"), "{text}");
}

#[tokio::test]
async fn invalid_json_from_backend_is_a_server_error() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok("HEALTH_OK", ""));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status.json")).await;
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body_text(), "Error decoding JSON from HEALTH_OK");
}

// ── Backend failures ────────────────────────────────────────────────

#[tokio::test]
async fn backend_error_status_is_passed_through() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::failed(-2, "ENOENT"));

    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status.json")).await;
    assert_eq!(resp.status, 400);
    assert_eq!(
        json_body(&resp.body),
        json!({"output": [], "status": "Error: ENOENT (-2)"})
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_request() {
    let (backend, d) = setup_with(FakeBackend {
        unreachable: true,
        ..Default::default()
    });
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status")).await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("connection refused"));
    assert_eq!(backend.count(), 1, "no retry");
}

#[tokio::test]
async fn slow_backend_times_out_once_without_retry() {
    let (backend, d) = setup_with_timeout(
        FakeBackend {
            delay: Some(Duration::from_millis(800)),
            ..Default::default()
        },
        Duration::from_millis(100),
    );
    let started = std::time::Instant::now();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/status")).await;
    assert!(started.elapsed() < Duration::from_millis(700), "{:?}", started.elapsed());
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("timed out"), "{}", resp.body_text());
    assert_eq!(backend.count(), 1, "no retry");
}

// ── Discovery and unknown endpoints ─────────────────────────────────

#[tokio::test]
async fn partial_path_lists_matching_commands_only() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/osd/pool/st")).await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.content_type, "text/html");
    let html = resp.body_text();
    assert!(html.contains("osd/pool/stats"), "{html}");
    assert!(!html.contains("osd/pool/set"), "{html}");
}

#[tokio::test]
async fn base_url_lists_every_rest_command() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1")).await;
    assert_eq!(resp.status, 400);
    let html = resp.body_text();
    assert!(html.contains("status"));
    assert!(html.contains("tell/&lt;osdid&gt;/bench"), "{html}");
    assert!(!html.contains("rmsnap"), "cli-only commands are not served");
}

#[tokio::test]
async fn unknown_endpoint_without_matches_is_not_found() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/mds/fail")).await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_text(), "Invalid endpoint /api/v0.1/mds/fail");
}

#[tokio::test]
async fn path_outside_base_is_not_found() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/other/status")).await;
    assert_eq!(resp.status, 404);
}

// ── Methods ─────────────────────────────────────────────────────────

#[tokio::test]
async fn read_and_write_overloads_register_method_union() {
    let (backend, d) = setup();

    let resp = d.dispatch(ApiRequest::new("POST", "/api/v0.1/auth/caps?entity=client.a")).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.allow.as_deref(), Some("GET, PUT, DELETE"));

    let resp = d
        .dispatch(ApiRequest::new("GET", "/api/v0.1/auth/caps?entity=client.a"))
        .await;
    assert_eq!(resp.status, 200);
    assert!(!backend.last().args.contains_key("caps"));

    let resp = d
        .dispatch(ApiRequest::new(
            "DELETE",
            "/api/v0.1/auth/caps?entity=client.a&caps=mon&caps=allow%20r",
        ))
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(backend.last().args["caps"], json!(["mon", "allow r"]));
}

#[tokio::test]
async fn read_only_route_rejects_post_with_allow_header() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/osd/pool/stats")).await;
    assert_eq!(resp.status, 200);

    let resp = d.dispatch(ApiRequest::new("POST", "/api/v0.1/osd/pool/stats")).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.allow.as_deref(), Some("GET"));
}

#[tokio::test]
async fn catch_all_admits_only_get_and_put() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("DELETE", "/api/v0.1/osd/pool/st")).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.allow.as_deref(), Some("GET, PUT"));

    let resp = d.dispatch(ApiRequest::new("PUT", "/api/v0.1/osd/pool/st")).await;
    assert_eq!(resp.status, 400);
}

// ── Overload selection ──────────────────────────────────────────────

#[tokio::test]
async fn zero_params_prefer_the_zero_param_overload() {
    let (backend, d) = setup();

    d.dispatch(ApiRequest::new("GET", "/api/v0.1/mon/dump")).await;
    assert_eq!(backend.last().args["module"], "mon_current");

    d.dispatch(ApiRequest::new("GET", "/api/v0.1/mon/dump?epoch=3")).await;
    let sent = backend.last();
    assert_eq!(sent.args["module"], "mon_epoch");
    assert_eq!(sent.args["epoch"], 3);
}

#[tokio::test]
async fn all_optional_overload_binds_zero_params_when_alone() {
    let (backend, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/osd/pool/stats")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(backend.last().prefix, "osd pool stats");
}

#[tokio::test]
async fn repeated_dispatch_selects_the_same_entry() {
    let (backend, d) = setup();
    let mut modules = Vec::new();
    for _ in 0..5 {
        d.dispatch(ApiRequest::new("GET", "/api/v0.1/mon/dump")).await;
        modules.push(backend.last().args["module"].clone());
    }
    assert!(modules.iter().all(|m| *m == modules[0]));
}

#[tokio::test]
async fn failures_of_every_candidate_are_concatenated() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/mon/dump?epoch=-1")).await;
    assert_eq!(resp.status, 400);
    let text = resp.body_text();
    let reasons: Vec<&str> = text.lines().collect();
    assert_eq!(reasons.len(), 2, "{text}");
    assert!(reasons[0].contains("not in range"), "{text}");
    assert_eq!(reasons[1], "unused arguments: epoch");
}

// ── Help ────────────────────────────────────────────────────────────

#[tokio::test]
async fn help_flag_returns_usage_without_running() {
    let (backend, d) = setup();
    let resp = d.dispatch(ApiRequest::new("PUT", "/api/v0.1/osd/pool/set?help")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "text/plain");
    assert_eq!(
        resp.body_text(),
        "osd pool set <pool> size|min_size <val>: set pool parameter <var> to <val>"
    );
    assert_eq!(backend.count(), 0);
}

// ── Targets ─────────────────────────────────────────────────────────

#[tokio::test]
async fn tell_route_targets_the_named_osd() {
    let (backend, d) = setup();
    let resp = d
        .dispatch(ApiRequest::new("PUT", "/api/v0.1/tell/osd.2/bench?count=5"))
        .await;
    assert_eq!(resp.status, 200);
    let sent = backend.last();
    assert_eq!(sent.prefix, "bench");
    assert_eq!(sent.target, Target::osd(2));
    assert_eq!(sent.args["count"], 5);
}

#[tokio::test]
async fn tell_route_with_malformed_target_fails_resolution() {
    let (backend, d) = setup();
    let resp = d.dispatch(ApiRequest::new("PUT", "/api/v0.1/tell/mds.a/bench")).await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("mds.a"), "{}", resp.body_text());
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn tell_route_with_malformed_target_still_answers_help() {
    let (_, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/tell/bogus/bench?help")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "bench {<count>}: run OSD benchmark");
}

#[tokio::test]
async fn pg_route_targets_the_placement_group() {
    let (backend, d) = setup();
    let resp = d
        .dispatch(ApiRequest::new("GET", "/api/v0.1/pg?pgid=1.2f&cmd=query"))
        .await;
    assert_eq!(resp.status, 200);
    let sent = backend.last();
    assert_eq!(sent.target.role, Role::Pg);
    assert_eq!(sent.target.id, "1.2f");
    assert_eq!(sent.args["pgid"], "1.2f");
    assert_eq!(sent.prefix, "pg");
}

#[tokio::test]
async fn pg_route_with_malformed_pgid_fails_resolution() {
    let (backend, d) = setup();
    let resp = d.dispatch(ApiRequest::new("GET", "/api/v0.1/pg?pgid=zz&cmd=query")).await;
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().contains("zz"));
    assert_eq!(backend.count(), 0);
}

// ── HTTP surface ────────────────────────────────────────────────────

#[tokio::test]
async fn root_redirects_to_base_url() {
    let (_, d) = setup();
    let app = http::routes(Arc::new(d));
    let req = Request::get("/").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get("location").unwrap(), "/api/v0.1");
}

#[tokio::test]
async fn router_serves_formatted_command_output() {
    let (backend, d) = setup();
    backend.reply("status", CommandReply::ok(r#"{"health": "HEALTH_OK"}"#, ""));
    let app = http::routes(Arc::new(d));

    let req = Request::get("/api/v0.1/status.json").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/json");
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(json_body(&body)["output"]["health"], "HEALTH_OK");
}

#[tokio::test]
async fn router_reports_allow_header_on_405() {
    let (_, d) = setup();
    let app = http::routes(Arc::new(d));
    let req = Request::get("/api/v0.1/osd/pool/set").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers().get("allow").unwrap(), "PUT, DELETE");
}

#[tokio::test]
async fn router_passes_request_body_through() {
    let (backend, d) = setup();
    let app = http::routes(Arc::new(d));
    let req = Request::put("/api/v0.1/osd/pool/set?pool=rbd&var=size&val=2")
        .body(Body::from("raw input"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(backend.last().inbuf, b"raw input");
}
