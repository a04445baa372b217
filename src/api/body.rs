//! Request body decoding
//!
//! The content kind is chosen once from the `Content-Type` header, then the
//! buffered bytes are decoded according to it.

use crate::error::ApiError;
use hyper::body::Bytes;
use serde_json::Value;
use std::collections::HashMap;

/// Decoding strategy selected from the request's content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    RawBytes,
    FormMapping,
    Text,
    Unknown,
}

impl ContentKind {
    /// Negotiate from a raw `Content-Type` value, parameters ignored
    ///
    /// Missing or unparseable headers are `Unknown`.
    pub fn negotiate(content_type: Option<&str>) -> Self {
        let Some(parsed) = content_type.and_then(|v| v.parse::<mime::Mime>().ok()) else {
            return Self::Unknown;
        };
        match parsed.essence_str().to_ascii_lowercase().as_str() {
            "application/json" => Self::Json,
            "application/octet-stream" => Self::RawBytes,
            "application/x-www-form-urlencoded" => Self::FormMapping,
            "text/plain" => Self::Text,
            _ => Self::Unknown,
        }
    }
}

/// Parsed request body
///
/// `Form` only supports key lookup; duplicate keys keep the last value.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Raw(Bytes),
    Form(HashMap<String, String>),
    Text(String),
    Unknown,
}

impl Body {
    pub fn decode(kind: ContentKind, raw: &Bytes) -> Result<Self, ApiError> {
        Ok(match kind {
            ContentKind::Json => {
                let text = String::from_utf8_lossy(raw);
                if text.is_empty() {
                    Self::Json(Value::Object(serde_json::Map::new()))
                } else {
                    Self::Json(serde_json::from_str(&text).map_err(|_| ApiError::invalid_json())?)
                }
            }
            ContentKind::RawBytes => Self::Raw(raw.clone()),
            ContentKind::FormMapping => Self::Form(decode_pairs(raw)),
            ContentKind::Text => Self::Text(String::from_utf8_lossy(raw).into_owned()),
            ContentKind::Unknown => Self::Unknown,
        })
    }

    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub const fn as_form(&self) -> Option<&HashMap<String, String>> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }
}

/// Decode `application/x-www-form-urlencoded` pairs into a flat map, last key wins
pub fn decode_pairs(input: &[u8]) -> HashMap<String, String> {
    form_urlencoded::parse(input).into_owned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_negotiate_content_kind() {
        assert_eq!(ContentKind::negotiate(Some("application/json")), ContentKind::Json);
        assert_eq!(
            ContentKind::negotiate(Some("application/json; charset=utf-8")),
            ContentKind::Json
        );
        assert_eq!(ContentKind::negotiate(Some("TEXT/PLAIN")), ContentKind::Text);
        assert_eq!(
            ContentKind::negotiate(Some("application/octet-stream")),
            ContentKind::RawBytes
        );
        assert_eq!(
            ContentKind::negotiate(Some("application/x-www-form-urlencoded")),
            ContentKind::FormMapping
        );
        assert_eq!(ContentKind::negotiate(Some("image/png")), ContentKind::Unknown);
        assert_eq!(ContentKind::negotiate(Some("not a type")), ContentKind::Unknown);
        assert_eq!(ContentKind::negotiate(None), ContentKind::Unknown);
    }

    #[test]
    fn test_decode_json() {
        let body = Body::decode(ContentKind::Json, &Bytes::from_static(br#"{"a":1}"#)).unwrap();
        assert_eq!(body, Body::Json(json!({"a": 1})));
    }

    #[test]
    fn test_decode_empty_json_is_empty_object() {
        let body = Body::decode(ContentKind::Json, &Bytes::new()).unwrap();
        assert_eq!(body, Body::Json(json!({})));
    }

    #[test]
    fn test_decode_bad_json_is_client_error() {
        let err = Body::decode(ContentKind::Json, &Bytes::from_static(b"{bad")).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_decode_form_last_wins() {
        let body = Body::decode(
            ContentKind::FormMapping,
            &Bytes::from_static(b"name=a+b&x=%2F&x=2"),
        )
        .unwrap();
        let form = body.as_form().unwrap();
        assert_eq!(form["name"], "a b");
        assert_eq!(form["x"], "2");
    }

    #[test]
    fn test_decode_raw_and_text() {
        let raw = Bytes::from_static(&[0, 159, 146, 150]);
        assert_eq!(
            Body::decode(ContentKind::RawBytes, &raw).unwrap(),
            Body::Raw(raw.clone())
        );
        let utf8 = Bytes::from_static("héllo".as_bytes());
        let text = Body::decode(ContentKind::Text, &utf8).unwrap();
        assert_eq!(text.as_text(), Some("héllo"));
        assert_eq!(Body::decode(ContentKind::Unknown, &raw).unwrap(), Body::Unknown);
    }
}
