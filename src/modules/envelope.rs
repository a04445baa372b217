//! Wire format between the server and a script handler process
//!
//! The adapted request goes to the script's stdin as one JSON document; the
//! script answers on stdout with a [`ScriptReply`].

use crate::api::{ApiRequest, ApiResponse, Body, Payload};
use crate::error::{ApiError, HandlerError, ScriptError};
use base64::Engine as _;
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Request document written to the handler's stdin
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: Value,
    /// `json`, `text`, `form`, `base64`, `invalid`, or absent when the content type is unknown
    pub body_encoding: Option<&'static str>,
    /// Set when the body could not be decoded; `body` then holds the raw bytes as base64
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_error: Option<BodyError>,
}

/// Decode failure handed to the script instead of answering for it
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BodyError {
    pub status: u16,
    pub message: String,
}

impl From<&ApiError> for BodyError {
    fn from(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl RequestEnvelope {
    /// Resolve every lazy property of `req`
    ///
    /// A body that fails to decode does not fail the envelope. The script gets
    /// the raw bytes together with the error and decides how to answer.
    pub fn from_request(req: &mut ApiRequest) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in req.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let (body, body_encoding, body_error) = match req.body() {
            Ok(Body::Json(value)) => (value.clone(), Some("json"), None),
            Ok(Body::Text(text)) => (Value::String(text.clone()), Some("text"), None),
            Ok(Body::Form(form)) => (
                Value::Object(
                    form.iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect::<Map<_, _>>(),
                ),
                Some("form"),
                None,
            ),
            Ok(Body::Raw(bytes)) => (encode_base64(bytes), Some("base64"), None),
            Ok(Body::Unknown) => (Value::Null, None, None),
            Err(err) => {
                let error = BodyError::from(&err);
                (encode_base64(req.raw_body()), Some("invalid"), Some(error))
            }
        };

        Self {
            method: req.method().to_string(),
            url: req.uri().to_string(),
            headers,
            query: req.query().clone(),
            cookies: req.cookies().clone(),
            body,
            body_encoding,
            body_error,
        }
    }
}

fn encode_base64(bytes: &[u8]) -> Value {
    Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Reply document read from the handler's stdout
///
/// At most one of `json`, `sendBase64` and `send` is used, in that order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptReply {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub send: Option<Value>,
    #[serde(default)]
    pub send_base64: Option<String>,
}

impl ScriptReply {
    /// Parse stdout; empty output means an empty reply
    pub fn parse(stdout: &[u8]) -> Result<Self, ScriptError> {
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(stdout).map_err(ScriptError::Reply)
    }

    /// Replay the reply through the response helpers
    pub fn apply(self, res: &mut ApiResponse) -> Result<(), HandlerError> {
        if let Some(status) = self.status {
            res.status(status);
        }
        for (name, value) in &self.headers {
            res.set_header(name, value)?;
        }

        if let Some(value) = self.json {
            res.json(&value)?;
        } else if let Some(encoded) = self.send_base64 {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(ScriptError::Base64)?;
            res.send(Bytes::from(bytes))?;
        } else if let Some(value) = self.send {
            res.send(Payload::Value(value))?;
        } else {
            res.end();
        }
        Ok(())
    }
}
