//! Client facade and the per-call builder

use core::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::base_url::BaseUrl;
use crate::error::Error;
use crate::headers::Headers;
use crate::request::{compose, Body, CallParts, Method, Query, RawBody};
use crate::response::{Fetched, FetchResult, Payload};
use crate::transport::{
    CacheMode, CredentialsMode, RedirectMode, ReferrerPolicy, RequestMode, Transport,
    TransportOptions,
};

type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Shared, immutable configuration behind a client and all its clones.
struct ClientConfig {
    base: BaseUrl,
    default_headers: Headers,
    options: TransportOptions,
    transport: Arc<dyn Transport>,
    on_error: Option<ErrorHook>,
}

/// HTTP client over a pluggable transport.
///
/// A client is a base URL, a set of default headers, transport behavior
/// flags, and the transport itself. Each verb method starts a
/// [`CallBuilder`]; the builder's `send*` terminals run the whole
/// compose, fetch and decode pipeline and always come back with a
/// [`FetchResult`], never a panic.
///
/// Cloning is cheap and clones share the configuration and transport, so a
/// client can be handed to any number of tasks.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base", &self.config.base)
            .field("default_headers", &self.config.default_headers)
            .field("options", &self.config.options)
            .field("transport", &self.config.transport)
            .field("on_error", &self.config.on_error.is_some())
            .finish()
    }
}

impl Client {
    /// Start building a client rooted at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            base: base_url.into(),
            default_headers: Headers::new(),
            options: TransportOptions::default(),
            transport: None,
            on_error: None,
        }
    }

    /// A client with the given base URL and all defaults.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::builder(base_url).build()
    }

    /// The base URL every relative call path is resolved against.
    pub fn base_url(&self) -> &BaseUrl {
        &self.config.base
    }

    /// Start a call with an explicit method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> CallBuilder {
        CallBuilder {
            client: self.clone(),
            method,
            parts: CallParts {
                path: path.into(),
                ..Default::default()
            },
            pending: None,
        }
    }

    /// Start a GET call.
    pub fn get(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Get, path)
    }

    /// Start a POST call.
    pub fn post(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Post, path)
    }

    /// Start a PUT call.
    pub fn put(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Put, path)
    }

    /// Start a PATCH call.
    pub fn patch(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Patch, path)
    }

    /// Start a DELETE call.
    pub fn delete(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Delete, path)
    }

    /// Start a HEAD call.
    pub fn head(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Head, path)
    }

    /// Start an OPTIONS call.
    pub fn options(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Options, path)
    }

    /// Start a TRACE call.
    pub fn trace(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Trace, path)
    }

    /// Start a CONNECT call.
    pub fn connect(&self, path: impl Into<String>) -> CallBuilder {
        self.request(Method::Connect, path)
    }

    /// The whole pipeline: compose, fetch, classify, decode, validate.
    async fn dispatch<T, F>(
        &self,
        method: Method,
        parts: CallParts,
        pending: Option<Error>,
        validate: F,
    ) -> FetchResult<T>
    where
        F: FnOnce(Payload) -> Result<T, String>,
    {
        if let Some(err) = pending {
            return Err(err);
        }
        let config = self.config.as_ref();

        let request = compose(
            &config.base,
            &config.default_headers,
            &config.options,
            method,
            parts,
        )?;
        tracing::debug!("Sending {} request to {}", request.method, request.url);

        let response = match config.transport.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("Transport failure: {}", err);
                return Err(Error::Transport(err));
            }
        };

        if !response.is_success() {
            return Err(Error::Status { response });
        }

        let payload = match response.payload() {
            Ok(payload) => payload,
            Err(source) => {
                tracing::warn!("Could not decode response body: {}", source);
                return Err(Error::Decode { response, source });
            }
        };

        match validate(payload) {
            Ok(data) => Ok(Fetched { data, response }),
            Err(message) => Err(Error::Validation { response, message }),
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    base: String,
    default_headers: Headers,
    options: TransportOptions,
    transport: Option<Arc<dyn Transport>>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base", &self.base)
            .field("default_headers", &self.default_headers)
            .field("options", &self.options)
            .field("transport", &self.transport)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Add a default header sent on every call unless overridden or unset
    /// by the call.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.set(name, value);
        self
    }

    /// Cache behavior flag, passed to the transport verbatim.
    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.options.cache = Some(cache);
        self
    }

    /// Credentials behavior flag, passed to the transport verbatim.
    pub fn credentials(mut self, credentials: CredentialsMode) -> Self {
        self.options.credentials = Some(credentials);
        self
    }

    /// Expected integrity digest, passed to the transport verbatim.
    pub fn integrity(mut self, integrity: impl Into<String>) -> Self {
        self.options.integrity = Some(integrity.into());
        self
    }

    /// Keepalive flag, passed to the transport verbatim.
    pub fn keepalive(mut self, keepalive: bool) -> Self {
        self.options.keepalive = Some(keepalive);
        self
    }

    /// Cross-origin mode flag, passed to the transport verbatim.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.options.mode = Some(mode);
        self
    }

    /// Redirect behavior. The bundled transport honors this when it is
    /// constructed.
    pub fn redirect(mut self, redirect: RedirectMode) -> Self {
        self.options.redirect = Some(redirect);
        self
    }

    /// Referrer to disclose.
    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.options.referrer = Some(referrer.into());
        self
    }

    /// Referrer policy flag, passed to the transport verbatim.
    pub fn referrer_policy(mut self, policy: ReferrerPolicy) -> Self {
        self.options.referrer_policy = Some(policy);
        self
    }

    /// Use a custom transport instead of the bundled one.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Observe every status failure.
    ///
    /// The hook runs synchronously, once per failed call, before the
    /// error is returned. It fires for [`Error::Status`] only; build,
    /// transport, decode and validation failures come back without
    /// passing through it. It cannot alter the result.
    pub fn on_error(mut self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Validate the base URL and assemble the client.
    pub fn build(self) -> Result<Client, Error> {
        let base = BaseUrl::parse(&self.base)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.options)?,
        };
        Ok(Client {
            config: Arc::new(ClientConfig {
                base,
                default_headers: self.default_headers,
                options: self.options,
                transport,
                on_error: self.on_error,
            }),
        })
    }
}

#[cfg(feature = "reqwest")]
fn default_transport(options: &TransportOptions) -> Result<Arc<dyn Transport>, Error> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new(options)?))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport(_options: &TransportOptions) -> Result<Arc<dyn Transport>, Error> {
    Err(Error::Build(
        "No transport: enable the `reqwest` feature or supply one with `ClientBuilder::transport`"
            .to_string(),
    ))
}

/// One call under construction.
///
/// Created by the client's verb methods, consumed by one of the `send*`
/// terminals. Everything set here applies to this call only.
#[derive(Debug)]
pub struct CallBuilder {
    client: Client,
    method: Method,
    parts: CallParts,
    pending: Option<Error>,
}

impl CallBuilder {
    /// Set a header for this call, overriding any default with the same
    /// case-insensitive name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.headers.set(name, value);
        self
    }

    /// Suppress a default header for this call.
    pub fn unset_header(mut self, name: impl Into<String>) -> Self {
        self.parts.headers.unset(name);
        self
    }

    /// Append one query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.query.append(key, value);
        self
    }

    /// Append several query parameters, keeping their order.
    pub fn query_pairs<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.parts.query.append(key, value);
        }
        self
    }

    /// Replace the query with a pre-encoded string used verbatim.
    pub fn raw_query(mut self, raw: impl Into<String>) -> Self {
        self.parts.query = Query::Raw(raw.into());
        self
    }

    /// Set the request body.
    ///
    /// A structured [`Body::Value`] is serialized according to the
    /// effective merged `Content-Type` at send time and dropped when that
    /// type is absent or unrecognized; a [`Body::Raw`] goes to the
    /// transport unchanged.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.parts.body = Some(body.into());
        self
    }

    /// Serialize `body` as JSON and set `Content-Type: application/json`
    /// for this call.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.parts.headers.set("Content-Type", "application/json");
                self.parts.body = Some(Body::Value(value));
            }
            Err(e) => {
                self.pending = Some(Error::Build(format!("Could not serialize body: {e}")));
            }
        }
        self
    }

    /// URL-encode `fields` as the body and set
    /// `Content-Type: application/x-www-form-urlencoded` for this call.
    pub fn form<K, V, I>(mut self, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs: Vec<(String, String)> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        match serde_urlencoded::to_string(&pairs) {
            Ok(text) => {
                self.parts
                    .headers
                    .set("Content-Type", "application/x-www-form-urlencoded");
                self.parts.body = Some(Body::Raw(RawBody::Text(text)));
            }
            Err(e) => {
                self.pending = Some(Error::Build(format!("Could not encode form body: {e}")));
            }
        }
        self
    }

    /// Send and hand back the decoded payload as-is.
    pub async fn send(self) -> FetchResult<Payload> {
        self.execute(Ok).await
    }

    /// Send and narrow the decoded payload into `T`.
    ///
    /// The deserialization acts as the validator: a payload that does not
    /// fit `T` comes back as [`Error::Validation`] with the response
    /// attached.
    pub async fn send_as<T: DeserializeOwned>(self) -> FetchResult<T> {
        self.execute(|payload| payload.parse::<T>().map_err(|e| e.to_string()))
            .await
    }

    /// Send and run a caller-supplied validator over the decoded payload.
    ///
    /// The validator narrows the loose payload into `T` or rejects it
    /// with a message, which comes back as [`Error::Validation`].
    pub async fn send_validated<T, F>(self, validate: F) -> FetchResult<T>
    where
        F: FnOnce(Payload) -> Result<T, String>,
    {
        self.execute(validate).await
    }

    async fn execute<T, F>(self, validate: F) -> FetchResult<T>
    where
        F: FnOnce(Payload) -> Result<T, String>,
    {
        let Self {
            client,
            method,
            parts,
            pending,
        } = self;

        let result = client.dispatch(method, parts, pending, validate).await;

        if let Err(err) = &result {
            if matches!(err, Error::Status { .. }) {
                if let Some(hook) = &client.config.on_error {
                    hook(err);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use crate::transport::TransportError;

    /// Records every request and answers each with the same canned reply.
    #[derive(Debug)]
    struct StubTransport {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
        seen: Arc<Mutex<Vec<Request>>>,
    }

    impl StubTransport {
        fn new(status: u16, content_type: Option<&str>, body: &[u8]) -> Self {
            Self {
                status,
                content_type: content_type.map(ToString::to_string),
                body: body.to_vec(),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn json(status: u16, body: &str) -> Self {
            Self::new(status, Some("application/json"), body.as_bytes())
        }

        fn seen(&self) -> Arc<Mutex<Vec<Request>>> {
            self.seen.clone()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn fetch(&self, request: Request) -> Result<Response, TransportError> {
            let url = request.url.clone();
            self.seen
                .lock()
                .expect("Lock should not be poisoned")
                .push(request);
            let mut headers = Headers::new();
            if let Some(ct) = &self.content_type {
                headers.set("Content-Type", ct.clone());
            }
            Ok(Response::new(self.status, url, headers, self.body.clone()))
        }
    }

    /// Always fails before producing a response.
    #[derive(Debug)]
    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn fetch(&self, _request: Request) -> Result<Response, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    fn client_with(transport: impl Transport + 'static) -> Client {
        Client::builder("http://host.example/api")
            .transport(transport)
            .build()
            .expect("Client should build")
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[tokio::test]
    async fn every_verb_reaches_the_wire() {
        let verbs: [(Method, fn(&Client, String) -> CallBuilder); 9] = [
            (Method::Get, |c, p| c.get(p)),
            (Method::Post, |c, p| c.post(p)),
            (Method::Put, |c, p| c.put(p)),
            (Method::Patch, |c, p| c.patch(p)),
            (Method::Delete, |c, p| c.delete(p)),
            (Method::Head, |c, p| c.head(p)),
            (Method::Options, |c, p| c.options(p)),
            (Method::Trace, |c, p| c.trace(p)),
            (Method::Connect, |c, p| c.connect(p)),
        ];

        for (method, start) in verbs {
            let stub = StubTransport::json(200, "{}");
            let seen = stub.seen();
            let client = client_with(stub);

            start(&client, "users".to_string())
                .send()
                .await
                .expect("Call should succeed");

            let seen = seen.lock().expect("Lock should not be poisoned");
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].method, method);
            assert_eq!(seen[0].url.as_str(), "http://host.example/api/users");
        }
    }

    #[tokio::test]
    async fn send_as_narrows_the_payload() {
        let client = client_with(StubTransport::json(200, r#"{"id":3,"name":"John Doe"}"#));

        let fetched = client
            .get("users/3")
            .send_as::<User>()
            .await
            .expect("Call should succeed");
        assert_eq!(
            fetched.data,
            User {
                id: 3,
                name: "John Doe".to_string()
            }
        );
        assert_eq!(fetched.response.status(), 200);
    }

    #[tokio::test]
    async fn mismatched_payload_is_a_validation_error() {
        let client = client_with(StubTransport::json(200, r#"{"unexpected":true}"#));

        let err = client
            .get("users/3")
            .send_as::<User>()
            .await
            .expect_err("Narrowing should fail");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn validator_rejection_keeps_the_response() {
        let client = client_with(StubTransport::json(200, r#"{"id":3}"#));

        let err = client
            .get("users/3")
            .send_validated(|_payload| Err::<User, _>("not a user".to_string()))
            .await
            .expect_err("Validator should reject");
        match err {
            Error::Validation { response, message } => {
                assert_eq!(message, "not a user");
                assert_eq!(response.status(), 200);
            }
            other => panic!("Expected a validation error, got {other}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_the_response() {
        let client = client_with(StubTransport::json(404, r#"{"message":"gone"}"#));

        let err = client
            .delete("users/999")
            .send()
            .await
            .expect_err("Status should fail the call");
        assert!(matches!(err, Error::Status { .. }));
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn transport_failure_carries_no_response() {
        let client = client_with(DownTransport);

        let err = client
            .get("users")
            .send()
            .await
            .expect_err("Transport should fail");
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.response().is_none());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let client = client_with(StubTransport::json(200, "not json"));

        let err = client
            .get("users")
            .send()
            .await
            .expect_err("Decode should fail");
        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn error_hook_fires_once_per_status_failure_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let client = Client::builder("http://host.example/api")
            .transport(StubTransport::json(500, r#"{"message":"boom"}"#))
            .on_error(move |err| {
                assert_eq!(err.status(), Some(500));
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("Client should build");

        let err = client
            .get("users")
            .send()
            .await
            .expect_err("Status should fail the call");
        assert!(matches!(err, Error::Status { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_hook_skips_validation_and_transport_failures() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = calls.clone();
        let client = Client::builder("http://host.example/api")
            .transport(StubTransport::json(200, r#"{"unexpected":true}"#))
            .on_error(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("Client should build");
        client
            .get("users")
            .send_as::<User>()
            .await
            .expect_err("Narrowing should fail");

        let counted = calls.clone();
        let client = Client::builder("http://host.example/api")
            .transport(DownTransport)
            .on_error(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("Client should build");
        client.get("users").send().await.expect_err("Transport should fail");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_headers_apply_and_tombstones_suppress() {
        let stub = StubTransport::json(200, "{}");
        let seen = stub.seen();
        let client = Client::builder("http://host.example/api")
            .default_header("Authorization", "Bearer abc")
            .default_header("Accept", "application/json")
            .transport(stub)
            .build()
            .expect("Client should build");

        client
            .get("users")
            .unset_header("authorization")
            .send()
            .await
            .expect("Call should succeed");

        let seen = seen.lock().expect("Lock should not be poisoned");
        assert_eq!(seen[0].headers.get("Authorization"), None);
        assert_eq!(seen[0].headers.get("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn json_builder_sets_the_content_type() {
        let stub = StubTransport::json(200, "{}");
        let seen = stub.seen();
        let client = client_with(stub);

        client
            .post("users")
            .json(&json!({"name": "Jane Doe"}))
            .send()
            .await
            .expect("Call should succeed");

        let seen = seen.lock().expect("Lock should not be poisoned");
        assert_eq!(
            seen[0].headers.get("content-type"),
            Some("application/json")
        );
        assert_eq!(
            seen[0].body,
            Some(RawBody::Text(r#"{"name":"Jane Doe"}"#.to_string()))
        );
    }

    #[tokio::test]
    async fn unserializable_body_fails_before_the_wire() {
        struct Refused;

        impl Serialize for Refused {
            fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                Err(serde::ser::Error::custom("refused"))
            }
        }

        let stub = StubTransport::json(200, "{}");
        let seen = stub.seen();
        let client = client_with(stub);

        let err = client
            .post("users")
            .json(&Refused)
            .send()
            .await
            .expect_err("Serialization should fail");
        assert!(matches!(err, Error::Build(_)));
        assert!(seen.lock().expect("Lock should not be poisoned").is_empty());
    }

    #[test]
    fn client_is_shareable() {
        fn assert_shareable<T: Clone + Send + Sync>() {}
        assert_shareable::<Client>();
    }
}
