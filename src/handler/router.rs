//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body size check, handler
//! matching, module reload and the static fallback.

use crate::api::{ApiRequest, ApiResponse, Handler};
use crate::config::AppState;
use crate::error::{ApiError, HandlerError, ReadBodyError};
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body as HttpBody, Bytes};
use hyper::header::{HeaderValue, SERVER, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: HttpBody,
    B::Error: Into<HandlerError>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        remote_addr.to_string(),
        req.method().to_string(),
        req.uri().to_string(),
    );
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = route_request(req, &state).await;

    if let Ok(name) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().entry(SERVER).or_insert(name);
    }

    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_request_finished(&entry, &state.config.logging.access_log_format);

    Ok(response)
}

/// Route request to a handler or the public directory
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: HttpBody,
    B::Error: Into<HandlerError>,
{
    let is_head = *req.method() == Method::HEAD;

    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    let handler_file = state
        .handlers
        .match_path(req.uri().path(), &state.config.project.api_prefix);
    if let Some(file) = handler_file {
        return dispatch_handler(req, &file, state).await;
    }

    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        logger::log_warning(&format!("Method not allowed: {}", req.method()));
        return http::build_405_response();
    }

    let if_none_match = req
        .headers()
        .get("if-none-match")
        .and_then(|v| v.to_str().ok());
    static_files::serve_public(
        &state.config.public_dir(),
        req.uri().path(),
        if_none_match,
        is_head,
    )
    .await
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Reload (unless cached) and invoke the handler module at `file`
///
/// Loading touches the filesystem, so it runs on the blocking pool.
async fn dispatch_handler<B>(
    req: Request<B>,
    file: &Path,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: HttpBody,
    B::Error: Into<HandlerError>,
{
    let is_head = *req.method() == Method::HEAD;
    let specifier = file.to_string_lossy().into_owned();
    let purge = !state.module_cache();
    let registry = Arc::clone(&state.registry);
    let loader = state.loader.clone();

    let loaded = tokio::task::spawn_blocking(move || {
        if purge {
            registry.purge(&specifier);
        }
        registry.load_with(&specifier, &loader)
    })
    .await;
    let module = match loaded {
        Ok(Ok(module)) => module,
        Ok(Err(e)) => {
            logger::log_error(&format!("Failed to load handler: {e}"));
            return http::build_500_response(is_head);
        }
        Err(e) => {
            logger::log_error(&format!("Handler loader aborted: {e}"));
            return http::build_500_response(is_head);
        }
    };

    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let mut api_req = match ApiRequest::adapt(req, limit).await {
        Ok(api_req) => api_req,
        Err(ReadBodyError::TooLarge { limit }) => {
            logger::log_error(&format!("Request body too large (max: {limit})"));
            return http::build_413_response();
        }
        Err(e) => {
            logger::log_warning(&format!("{e}"));
            return http::build_error_response(400, "Bad Request", is_head);
        }
    };

    run_handler(module.as_ref(), &mut api_req).await
}

/// Invoke `handler` and turn its outcome into a response
///
/// A handler that returns without sending gets an empty body. Errors become
/// the generic error page unless the response was already written.
pub async fn run_handler(handler: &dyn Handler, req: &mut ApiRequest) -> Response<Full<Bytes>> {
    let is_head = req.is_head();
    let mut res = ApiResponse::new(is_head);

    match handler.call(req, &mut res).await {
        Ok(()) => {
            if !res.is_finalized() {
                res.end();
            }
            res.into_response()
        }
        Err(err) if res.is_finalized() => {
            logger::log_error(&format!("Handler failed after responding: {err}"));
            res.into_response()
        }
        Err(err) => error_response(&err, is_head),
    }
}

fn error_response(err: &HandlerError, is_head: bool) -> Response<Full<Bytes>> {
    if let Some(api_err) = err.downcast_ref::<ApiError>() {
        logger::log_warning(&format!("Handler rejected input: {api_err}"));
        return http::build_error_response(api_err.status(), &api_err.to_string(), is_head);
    }
    logger::log_error(&format!("Handler failed: {err}"));
    http::build_500_response(is_head)
}
