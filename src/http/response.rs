//! Canned HTTP responses
//!
//! Builders for the fixed responses the dispatcher and static responder emit.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(304)
        .header("ETag", etag)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response(is_head: bool) -> Response<Full<Bytes>> {
    build_error_response(404, "The requested path could not be found", is_head)
}

/// Build 405 Method Not Allowed response for static assets
pub fn build_405_response() -> Response<Full<Bytes>> {
    let mut res = build_error_response(405, "Method Not Allowed", false);
    res.headers_mut()
        .insert("Allow", hyper::header::HeaderValue::from_static("GET, HEAD"));
    res
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_error_response(413, "Request body too large", false)
}

/// Build 500 Internal Server Error response, never carries internal details
pub fn build_500_response(is_head: bool) -> Response<Full<Bytes>> {
    build_error_response(500, "Internal Server Error", is_head)
}

/// Build an HTML error page with the given status
pub fn build_error_response(status: u16, message: &str, is_head: bool) -> Response<Full<Bytes>> {
    let html = error_page(status, message);
    let content_length = html.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(html)
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build success response with a validator
pub fn build_cached_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", "no-cache")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Generic error template; only the status and a fixed message are rendered
pub fn error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{status} - {message}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Arial, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
            color: #333;
        }}
        h1 {{ font-size: 4em; margin: 0; }}
        p {{ color: #777; }}
    </style>
</head>
<body>
    <main>
        <h1>{status}</h1>
        <p>{message}</p>
    </main>
</body>
</html>
"#
    )
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_renders_status() {
        let html = error_page(500, "Internal Server Error");
        assert!(html.contains("<h1>500</h1>"));
        assert!(html.contains("Internal Server Error"));
    }

    #[test]
    fn test_head_error_has_no_body() {
        use hyper::body::Body as _;
        let res = build_404_response(true);
        assert_eq!(res.status(), 404);
        assert!(res.headers().contains_key("content-length"));
        assert_eq!(res.body().size_hint().exact(), Some(0));
    }
}
