//! Response helpers: `status`, `send` and `json`
//!
//! A response accepts header and status changes until the first `send` or
//! `json` call finalizes it. Any later `send`/`json` is rejected with
//! [`ResponseError::AlreadyFinalized`] and leaves the written response intact.

use crate::error::ResponseError;
use crate::http::cache;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG, TRANSFER_ENCODING,
};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Argument accepted by [`ApiResponse::send`]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    /// `Null` sends an empty text body, strings send text, anything else goes through `json`
    Value(Value),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Finalized,
}

/// Response being built by handler code
#[derive(Debug)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    head_only: bool,
    state: State,
}

impl ApiResponse {
    /// `head_only` is set for `HEAD` requests, which never write body bytes
    pub fn new(head_only: bool) -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            head_only,
            state: State::Configuring,
        }
    }

    /// Set the status code, the range is not checked
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    pub const fn status_code(&self) -> u16 {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<&mut Self, ResponseError> {
        let invalid = |reason: String| ResponseError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Body bytes that will be written, empty for `HEAD` and bodiless statuses
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize `value` and send it as `application/json; charset=utf-8`
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        let body = serde_json::to_string(value)?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
        }
        self.send(Payload::Text(body))
    }

    /// Write `payload` and finalize the response
    pub fn send(&mut self, payload: impl Into<Payload>) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        let (chunk, textual) = match payload.into() {
            Payload::Text(text) => {
                self.default_content_type("text/html");
                (Bytes::from(text), true)
            }
            Payload::Bytes(bytes) => {
                self.default_content_type("application/octet-stream");
                (bytes, false)
            }
            Payload::Value(Value::Null) => (Bytes::new(), true),
            Payload::Value(Value::String(text)) => {
                self.default_content_type("text/html");
                (Bytes::from(text), true)
            }
            Payload::Value(other) => return self.json(&other),
        };

        if textual {
            self.force_utf8_charset();
        }

        // Rust strings are already UTF-8, so the byte length is the content length
        // and the encoded bytes are reused as the body for short and long text alike.
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(chunk.len()));

        if !self.headers.contains_key(ETAG) {
            if let Ok(etag) = HeaderValue::from_str(&cache::generate_weak_etag(&chunk)) {
                self.headers.insert(ETAG, etag);
            }
        }

        self.body = chunk;
        if self.status == 204 || self.status == 304 {
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
            self.headers.remove(TRANSFER_ENCODING);
            self.body = Bytes::new();
        }
        if self.head_only {
            self.body = Bytes::new();
        }

        self.state = State::Finalized;
        Ok(self)
    }

    /// Finalize without a body if nothing was sent yet
    pub fn end(&mut self) -> &mut Self {
        if self.state == State::Configuring {
            self.body = Bytes::new();
            self.state = State::Finalized;
        }
        self
    }

    /// Convert into a hyper response
    ///
    /// A status outside 100..=999 cannot be expressed on the wire and becomes 500.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            crate::logger::log_error(&format!("Handler set invalid status code {}", self.status));
            StatusCode::INTERNAL_SERVER_ERROR
        });
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        match self.state {
            State::Configuring => Ok(()),
            State::Finalized => Err(ResponseError::AlreadyFinalized),
        }
    }

    fn default_content_type(&mut self, content_type: &'static str) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    /// Rewrite the content type's charset parameter to `utf-8`; unparseable types are kept
    fn force_utf8_charset(&mut self) {
        let Some(current) = self.header(CONTENT_TYPE.as_str()) else {
            return;
        };
        let Some(rewritten) = with_utf8_charset(current) else {
            return;
        };
        if let Ok(value) = HeaderValue::from_str(&rewritten) {
            self.headers.insert(CONTENT_TYPE, value);
        }
    }
}

fn with_utf8_charset(content_type: &str) -> Option<String> {
    let parsed = content_type.parse::<mime::Mime>().ok()?;
    let mut out = parsed.essence_str().to_string();
    for (name, value) in parsed.params() {
        if !name.as_str().eq_ignore_ascii_case("charset") {
            out.push_str(&format!("; {name}={value}"));
        }
    }
    out.push_str("; charset=utf-8");
    Some(out)
}
