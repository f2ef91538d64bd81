//! HTTP surface.
//!
//! Routes are late-bound catalog data, so instead of registering one axum
//! route per key the whole table sits behind a single fallback handler that
//! hands every request to the [`Dispatcher`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCEPT, ALLOW, CONTENT_TYPE, LOCATION, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::dispatch::{ApiRequest, ApiResponse, Dispatcher};
use crate::params::QueryParams;

/// Build the router. `GET /` redirects to the base path unless the API is
/// mounted at root.
pub fn routes(dispatcher: Arc<Dispatcher>) -> Router {
    let mut router = Router::new();
    if !dispatcher.table().base().is_root() {
        router = router.route("/", get(root_redirect));
    }
    router.fallback(dispatch_handler).with_state(dispatcher)
}

async fn root_redirect(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    let base = dispatcher.table().base().as_str().to_string();
    (StatusCode::FOUND, [(LOCATION, base)]).into_response()
}

async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user_agent = header_str(&headers, USER_AGENT.as_str()).unwrap_or("-");
    tracing::info!(method = %method, uri = %uri, user_agent, "Request");
    let accept = header_str(&headers, ACCEPT.as_str()).map(str::to_string);
    tracing::debug!(accept = accept.as_deref().unwrap_or(""), "Request accepts");

    let req = ApiRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: QueryParams::parse(uri.query()),
        accept,
        body: body.to_vec(),
    };
    into_response(dispatcher.dispatch(req).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn into_response(resp: ApiResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, resp.body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(resp.content_type));
    if let Some(allow) = resp.allow.and_then(|a| HeaderValue::from_str(&a).ok()) {
        headers.insert(ALLOW, allow);
    }
    response
}
