//! Buffered responses and decoded payloads

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::headers::Headers;

/// A fully buffered HTTP response.
///
/// Transports read the whole body before handing the response over, so
/// every accessor here is synchronous and can be called on the error path
/// as easily as on the success path.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    url: Url,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Assemble a response from its transport-level parts.
    pub fn new(status: u16, url: Url, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            url,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Final URL the response was served from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The `Content-Type` header, if the server sent one.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take ownership of the raw body bytes.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body as JSON, regardless of `Content-Type`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decode the body according to the response `Content-Type`.
    ///
    /// A content type containing `application/json` yields
    /// [`Payload::Json`]; anything else, including a missing header, yields
    /// the body as [`Payload::Text`].
    pub fn payload(&self) -> Result<Payload, serde_json::Error> {
        let is_json = self
            .content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        if is_json {
            Ok(Payload::Json(self.json()?))
        } else {
            Ok(Payload::Text(self.text().into_owned()))
        }
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Body decoded as a JSON document
    Json(Value),
    /// Body taken as plain text
    Text(String),
}

impl Payload {
    /// The JSON document, if this payload was decoded as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// The text, if this payload was taken as plain text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Convert into a JSON value; text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Narrow the payload into a concrete type.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_value())
    }
}

/// Decoded data together with the response it came from.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// The decoded (and possibly validated) payload
    pub data: T,
    /// The response the payload was decoded from
    pub response: Response,
}

/// Outcome of a single call: decoded data with its response, or an
/// [`Error`] describing where the pipeline stopped.
pub type FetchResult<T> = Result<Fetched<T>, Error>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(status: u16, content_type: Option<&str>, body: &[u8]) -> Response {
        let mut headers = Headers::new();
        if let Some(ct) = content_type {
            headers.set("Content-Type", ct);
        }
        let url = Url::parse("http://host.example/api").expect("Valid URL");
        Response::new(status, url, headers, body.to_vec())
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(response(200, None, b"").is_success());
        assert!(response(299, None, b"").is_success());
        assert!(!response(199, None, b"").is_success());
        assert!(!response(300, None, b"").is_success());
        assert!(!response(404, None, b"").is_success());
    }

    #[test]
    fn json_content_type_decodes_as_json() {
        let res = response(200, Some("application/json; charset=utf-8"), br#"{"id":3}"#);
        assert_eq!(
            res.payload().expect("Decode should succeed"),
            Payload::Json(json!({"id": 3}))
        );
    }

    #[test]
    fn other_content_types_decode_as_text() {
        let res = response(200, Some("text/html"), b"<p>hi</p>");
        assert_eq!(
            res.payload().expect("Decode should succeed"),
            Payload::Text("<p>hi</p>".to_string())
        );

        let missing = response(200, None, br#"{"id":3}"#);
        assert_eq!(
            missing.payload().expect("Decode should succeed"),
            Payload::Text(r#"{"id":3}"#.to_string())
        );
    }

    #[test]
    fn malformed_json_body_is_an_error() {
        let res = response(200, Some("application/json"), b"not json");
        assert!(res.payload().is_err());
    }

    #[test]
    fn invalid_utf8_text_is_replaced() {
        let res = response(200, Some("text/plain"), &[0x68, 0x69, 0xFF]);
        assert_eq!(res.text(), "hi\u{FFFD}");
    }

    #[test]
    fn payload_narrows_into_concrete_types() {
        let user: serde_json::Map<String, Value> = Payload::Json(json!({"id": 3}))
            .parse()
            .expect("Narrowing should succeed");
        assert_eq!(user.get("id"), Some(&json!(3)));

        let text: String = Payload::Text("pong".to_string())
            .parse()
            .expect("Narrowing should succeed");
        assert_eq!(text, "pong");
    }
}
