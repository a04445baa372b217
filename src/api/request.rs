//! Request adaptation
//!
//! Buffers the whole incoming body, then exposes `cookies`, `query` and
//! `body` as memoized properties.

use super::body::{decode_pairs, Body, ContentKind};
use super::lazy::LazyField;
use crate::error::{ApiError, HandlerError, ReadBodyError};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body as HttpBody, Bytes};
use hyper::header::{HeaderMap, CONTENT_TYPE, COOKIE};
use hyper::{Method, Request, Uri};
use std::collections::HashMap;

/// Request as seen by handler code
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw_body: Bytes,
    cookies: LazyField<HashMap<String, String>>,
    query: LazyField<HashMap<String, String>>,
    body: LazyField<Body>,
}

impl ApiRequest {
    /// Wait for the end of the body stream and wrap the request
    ///
    /// Stops reading once more than `limit` bytes arrive, whatever the
    /// declared length.
    pub async fn adapt<B>(req: Request<B>, limit: usize) -> Result<Self, ReadBodyError>
    where
        B: HttpBody,
        B::Error: Into<HandlerError>,
    {
        let (parts, body) = req.into_parts();
        let raw_body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    ReadBodyError::TooLarge { limit }
                } else {
                    ReadBodyError::Read(e)
                }
            })?
            .to_bytes();
        Ok(Self::from_parts(parts.method, parts.uri, parts.headers, raw_body))
    }

    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, raw_body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            raw_body,
            cookies: LazyField::Unresolved,
            query: LazyField::Unresolved,
            body: LazyField::Unresolved,
        }
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Buffered body bytes exactly as received
    pub const fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Content kind negotiated from the `Content-Type` header
    pub fn content_kind(&self) -> ContentKind {
        ContentKind::negotiate(
            self.headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )
    }

    pub fn cookies(&mut self) -> &HashMap<String, String> {
        self.cookies.resolve(|| parse_cookies(&self.headers))
    }

    pub fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies.override_with(cookies);
    }

    pub fn query(&mut self) -> &HashMap<String, String> {
        self.query
            .resolve(|| self.uri.query().map(|q| decode_pairs(q.as_bytes())).unwrap_or_default())
    }

    pub fn set_query(&mut self, query: HashMap<String, String>) {
        self.query.override_with(query);
    }

    /// Parsed body; a malformed JSON body fails with a 400 `ApiError` on every read
    pub fn body(&mut self) -> Result<&Body, ApiError> {
        let kind = self.content_kind();
        self.body.try_resolve(|| Body::decode(kind, &self.raw_body))
    }

    pub fn set_body(&mut self, body: Body) {
        self.body.override_with(body);
    }
}

/// Parse every `Cookie` header instance, joined with `;`
///
/// The first occurrence of a name wins and values are percent-decoded.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(";");

    let mut cookies = HashMap::new();
    for cookie in cookie::Cookie::split_parse_encoded(joined).flatten() {
        cookies
            .entry(cookie.name().to_string())
            .or_insert_with(|| cookie.value_trimmed().to_string());
    }
    cookies
}
