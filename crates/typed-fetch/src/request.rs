//! Request composition: method, query, body dispatch

use core::fmt;
use core::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::base_url::BaseUrl;
use crate::error::Error as ClientError;
use crate::headers::Headers;
use crate::transport::TransportOptions;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
}

impl Method {
    /// The method as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown HTTP method
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown HTTP method: {0}")]
pub struct UnknownMethod(String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Query parameters for one call.
///
/// The call's query owns the composed URL's `?` part entirely: whatever was
/// embedded in the path string is discarded before this is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Ordered key/value pairs; repeated keys are kept in order
    Pairs(Vec<(String, String)>),
    /// A pre-encoded query string used verbatim (a leading `?` is allowed)
    Raw(String),
}

impl Default for Query {
    fn default() -> Self {
        Self::Pairs(Vec::new())
    }
}

impl Query {
    /// Empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one pair. Appending over a raw string starts a fresh pair
    /// list, discarding the raw string.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let pair = (key.into(), value.into());
        match self {
            Self::Pairs(pairs) => pairs.push(pair),
            Self::Raw(_) => *self = Self::Pairs(vec![pair]),
        }
    }

    /// Whether encoding would produce no query at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Pairs(pairs) => pairs.is_empty(),
            Self::Raw(raw) => raw.trim_start_matches('?').is_empty(),
        }
    }

    /// Percent-encode into the final query string, or `None` when empty.
    pub fn encode(&self) -> Result<Option<String>, serde_urlencoded::ser::Error> {
        match self {
            Self::Pairs(pairs) if pairs.is_empty() => Ok(None),
            Self::Pairs(pairs) => serde_urlencoded::to_string(pairs).map(Some),
            Self::Raw(raw) => {
                let raw = raw.trim_start_matches('?');
                if raw.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(raw.to_string()))
                }
            }
        }
    }
}

/// A request body as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Structured value, serialized according to the effective merged
    /// `Content-Type` (or dropped when that type is absent or unrecognized)
    Value(Value),
    /// Already transport-ready body that skips content-type dispatch
    Raw(RawBody),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<RawBody> for Body {
    fn from(raw: RawBody) -> Self {
        Self::Raw(raw)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(RawBody::Bytes(bytes))
    }
}

/// Wire-ready request body handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    /// UTF-8 text (serialized JSON, form encoding, plain text, markup)
    Text(String),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Flat text parts of a multipart form; the transport supplies the
    /// `Content-Type` with its own boundary
    Multipart(Vec<(String, String)>),
}

/// A fully composed request, ready for [`Transport::fetch`].
///
/// [`Transport::fetch`]: crate::transport::Transport::fetch
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Absolute URL with the encoded query applied
    pub url: Url,
    /// Merged headers, tombstones already resolved
    pub headers: Headers,
    /// Serialized body, if one survived dispatch
    pub body: Option<RawBody>,
    /// Behavior flags passed through to the transport verbatim
    pub options: TransportOptions,
}

/// The per-call half of a request, before merging with client defaults.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallParts {
    pub path: String,
    pub headers: Headers,
    pub query: Query,
    pub body: Option<Body>,
}

/// Compose a transport-ready request from client defaults and call parts.
///
/// Pure and synchronous; the only failures are malformed paths and
/// unserializable queries or bodies, all surfaced as [`ClientError::Build`].
pub(crate) fn compose(
    base: &BaseUrl,
    defaults: &Headers,
    options: &TransportOptions,
    method: Method,
    parts: CallParts,
) -> Result<Request, ClientError> {
    let mut url = base.join(&parts.path)?;

    // The call query owns the `?` part: anything embedded in the path is
    // discarded even when no parameters were given.
    url.set_query(None);
    let encoded = parts
        .query
        .encode()
        .map_err(|e| ClientError::Build(format!("Could not encode query: {e}")))?;
    if let Some(query) = encoded {
        url.set_query(Some(&query));
    }

    let mut headers = defaults.merge(&parts.headers);

    let body = match parts.body {
        None => None,
        Some(Body::Raw(raw)) => Some(raw),
        Some(Body::Value(value)) => serialize_value(&headers, &value)?,
    };

    // An explicit multipart content type would lack the boundary; the
    // transport writes its own.
    if matches!(body, Some(RawBody::Multipart(_))) {
        headers.remove("content-type");
    }

    Ok(Request {
        method,
        url,
        headers,
        body,
        options: options.clone(),
    })
}

/// Serialize a structured body according to the merged `Content-Type`.
///
/// No recognized content type means no body: the value is dropped rather
/// than rejected, so a call without an explicit type degrades to a bodyless
/// request instead of failing.
fn serialize_value(headers: &Headers, value: &Value) -> Result<Option<RawBody>, ClientError> {
    let content_type = match headers.get("content-type") {
        Some(ct) => ct.to_ascii_lowercase(),
        None => return Ok(None),
    };

    if content_type.contains("application/json") || content_type.contains("text/plain") {
        let text = serde_json::to_string(value)
            .map_err(|e| ClientError::Build(format!("Could not serialize body: {e}")))?;
        return Ok(Some(RawBody::Text(text)));
    }
    if content_type.contains("multipart/form-data") {
        return Ok(Some(RawBody::Multipart(flat_pairs(value))));
    }
    if content_type.contains("application/x-www-form-urlencoded") {
        let pairs = flat_pairs(value);
        let text = serde_urlencoded::to_string(&pairs)
            .map_err(|e| ClientError::Build(format!("Could not encode form body: {e}")))?;
        return Ok(Some(RawBody::Text(text)));
    }
    if content_type.contains("text/html") {
        return Ok(Some(RawBody::Text(value_text(value))));
    }

    Ok(None)
}

/// Flatten a value into form fields.
///
/// Objects map entry-wise, arrays map with their indices as keys, and a
/// bare scalar yields no fields. Field values go through [`value_text`];
/// nothing is rejected.
fn flat_pairs(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), value_text(value)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, value)| (idx.to_string(), value_text(value)))
            .collect(),
        _ => Vec::new(),
    }
}

/// A field value as text: strings stay raw, everything else becomes its
/// JSON text.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
