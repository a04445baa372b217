//! Static asset responder
//!
//! Serves whatever is not claimed by a handler from the public directory.

use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Serve `path` from `public_dir`
pub async fn serve_public(
    public_dir: &Path,
    path: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    match load_from_directory(public_dir, path).await {
        Some((content, file_path)) => build_static_file_response(
            Bytes::from(content),
            mime::content_type_for(&file_path),
            if_none_match,
            is_head,
        ),
        None => http::build_404_response(is_head),
    }
}

/// Load a file below `public_dir`, falling back to index files for directories
pub async fn load_from_directory(public_dir: &Path, path: &str) -> Option<(Vec<u8>, PathBuf)> {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        logger::log_warning(&format!("Path traversal attempt blocked: {path}"));
        return None;
    }

    let Ok(root) = public_dir.canonicalize() else {
        return None;
    };

    let mut file_path = root.join(relative);
    if file_path.is_dir() {
        file_path = INDEX_FILES
            .iter()
            .map(|index| file_path.join(index))
            .find(|candidate| candidate.is_file())?;
    }

    // Missing files are an ordinary 404
    let canonical = file_path.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            path,
            canonical.display()
        ));
        return None;
    }

    match fs::read(&canonical).await {
        Ok(content) => Some((content, canonical)),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                canonical.display(),
                e
            ));
            None
        }
    }
}

/// Build static file response with a strong `ETag`
fn build_static_file_response(
    data: Bytes,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    http::build_cached_response(data, content_type, &etag, is_head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::Body as _;
    use std::fs as std_fs;

    fn public_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std_fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        std_fs::create_dir(dir.path().join("docs")).unwrap();
        std_fs::write(dir.path().join("docs").join("index.htm"), "docs").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_serves_file_with_mime() {
        let dir = public_dir();
        let res = serve_public(dir.path(), "/app.js", None, false).await;
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers()["content-type"],
            "application/javascript; charset=utf-8"
        );
        assert_eq!(res.headers()["content-length"], "14");
        assert!(res.headers().contains_key("etag"));
    }

    #[tokio::test]
    async fn test_directory_uses_index_files() {
        let dir = public_dir();
        let (content, _) = load_from_directory(dir.path(), "/").await.unwrap();
        assert_eq!(content, b"<h1>home</h1>");
        let (content, path) = load_from_directory(dir.path(), "/docs").await.unwrap();
        assert_eq!(content, b"docs");
        assert!(path.ends_with("docs/index.htm"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = public_dir();
        let res = serve_public(dir.path(), "/nope.css", None, false).await;
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn test_traversal_is_blocked() {
        let dir = public_dir();
        let inner = dir.path().join("inner");
        std_fs::create_dir(&inner).unwrap();
        assert!(load_from_directory(&inner, "/../index.html").await.is_none());
    }

    #[tokio::test]
    async fn test_matching_etag_is_304() {
        let dir = public_dir();
        let first = serve_public(dir.path(), "/app.js", None, false).await;
        let etag = first.headers()["etag"].to_str().unwrap().to_string();
        let second = serve_public(dir.path(), "/app.js", Some(&etag), false).await;
        assert_eq!(second.status(), 304);
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let dir = public_dir();
        let res = serve_public(dir.path(), "/app.js", None, true).await;
        assert_eq!(res.headers()["content-length"], "14");
        assert_eq!(res.body().size_hint().exact(), Some(0));
    }
}
