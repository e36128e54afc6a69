//! Transport seam and the bundled reqwest backend

use core::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::request::Request;
use crate::response::Response;

/// Cache behavior requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Use the HTTP cache normally
    Default,
    /// Bypass the cache entirely and do not store the response
    NoStore,
    /// Bypass the cache but store the response
    Reload,
    /// Revalidate with the server before using a cached response
    NoCache,
    /// Use any cached response, however stale
    ForceCache,
    /// Only answer from the cache, never from the network
    OnlyIfCached,
}

impl CacheMode {
    /// The mode as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::NoStore => "no-store",
            Self::Reload => "reload",
            Self::NoCache => "no-cache",
            Self::ForceCache => "force-cache",
            Self::OnlyIfCached => "only-if-cached",
        }
    }
}

/// Whether credentials accompany a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    /// Never send credentials
    Omit,
    /// Send credentials to the same origin only
    SameOrigin,
    /// Always send credentials
    Include,
}

impl CredentialsMode {
    /// The mode as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Omit => "omit",
            Self::SameOrigin => "same-origin",
            Self::Include => "include",
        }
    }
}

/// Cross-origin behavior requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Cross-origin requests follow CORS
    Cors,
    /// Cross-origin requests allowed, response opaque
    NoCors,
    /// Same-origin requests only
    SameOrigin,
    /// Navigation request
    Navigate,
}

impl RequestMode {
    /// The mode as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cors => "cors",
            Self::NoCors => "no-cors",
            Self::SameOrigin => "same-origin",
            Self::Navigate => "navigate",
        }
    }
}

/// What to do when the server redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow redirects transparently
    Follow,
    /// Fail the call on any redirect
    Error,
    /// Hand the redirect response back unfollowed
    Manual,
}

impl RedirectMode {
    /// The mode as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Error => "error",
            Self::Manual => "manual",
        }
    }
}

/// How much referrer information accompanies a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferrerPolicy {
    /// Send no referrer at all
    NoReferrer,
    /// Full referrer, except downgraded to origin over plain HTTP
    NoReferrerWhenDowngrade,
    /// Origin only
    Origin,
    /// Full referrer same-origin, origin only cross-origin
    OriginWhenCrossOrigin,
    /// Full referrer same-origin, nothing cross-origin
    SameOrigin,
    /// Origin only, and nothing on downgrade
    StrictOrigin,
    /// Full same-origin, origin cross-origin, nothing on downgrade
    StrictOriginWhenCrossOrigin,
    /// Full referrer always
    UnsafeUrl,
}

impl ReferrerPolicy {
    /// The policy as its wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReferrer => "no-referrer",
            Self::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            Self::Origin => "origin",
            Self::OriginWhenCrossOrigin => "origin-when-cross-origin",
            Self::SameOrigin => "same-origin",
            Self::StrictOrigin => "strict-origin",
            Self::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
            Self::UnsafeUrl => "unsafe-url",
        }
    }
}

/// Behavior flags carried verbatim on every composed request.
///
/// The core never interprets these; each transport honors what it can and
/// ignores the rest. The bundled [`ReqwestTransport`] honors `redirect`
/// (fixed at construction) and `referrer` (sent as the `Referer` header);
/// the sandbox-oriented flags (`cache`, `credentials`, `mode`, `integrity`,
/// `keepalive`, `referrer_policy`) have no native equivalent and are
/// ignored there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Cache behavior
    pub cache: Option<CacheMode>,
    /// Credentials behavior
    pub credentials: Option<CredentialsMode>,
    /// Expected subresource integrity digest
    pub integrity: Option<String>,
    /// Whether the call may outlive its initiator
    pub keepalive: Option<bool>,
    /// Cross-origin behavior
    pub mode: Option<RequestMode>,
    /// Redirect behavior
    pub redirect: Option<RedirectMode>,
    /// Referrer to disclose
    pub referrer: Option<String>,
    /// How much of the referrer to disclose
    pub referrer_policy: Option<ReferrerPolicy>,
}

/// Transport failure before any response existed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call timed out
    #[error("Request timed out")]
    Timeout,
    /// The server could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),
    /// Any other transport-level failure
    #[error("Transport error: {0}")]
    Other(String),
}

/// The injected fetch primitive: one request in, one buffered response out.
///
/// Implementations must not panic; every failure comes back as a
/// [`TransportError`]. A non-success HTTP status is not a transport
/// failure, the response is returned as-is and classified by the caller.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Perform one HTTP exchange.
    async fn fetch(&self, request: Request) -> Result<Response, TransportError>;
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use async_trait::async_trait;
    use reqwest::redirect;

    use super::{RedirectMode, Transport, TransportError, TransportOptions};
    use crate::headers::Headers;
    use crate::request::{Method, RawBody, Request};
    use crate::response::Response;

    /// The bundled transport, backed by a pooled [`reqwest::Client`].
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Build a transport honoring the given flags.
        ///
        /// Only `redirect` matters here: reqwest fixes its redirect policy
        /// per client, so it is applied at construction.
        pub fn new(options: &TransportOptions) -> Result<Self, TransportError> {
            let builder = match options.redirect {
                None | Some(RedirectMode::Follow) => reqwest::Client::builder(),
                Some(RedirectMode::Error) => {
                    reqwest::Client::builder().redirect(redirect::Policy::custom(|attempt| {
                        attempt.error("redirects are disabled")
                    }))
                }
                Some(RedirectMode::Manual) => {
                    reqwest::Client::builder().redirect(redirect::Policy::none())
                }
            };
            let client = builder
                .build()
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Self { client })
        }

        /// Wrap an existing [`reqwest::Client`], keeping its configuration.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn map_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Trace => reqwest::Method::TRACE,
            Method::Connect => reqwest::Method::CONNECT,
        }
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn fetch(&self, request: Request) -> Result<Response, TransportError> {
            let mut builder = self.client.request(map_method(request.method), request.url);

            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            if let Some(referrer) = &request.options.referrer {
                if referrer != "about:client" && !request.headers.contains("referer") {
                    builder = builder.header("Referer", referrer);
                }
            }

            match request.body {
                None => {}
                Some(RawBody::Text(text)) => builder = builder.body(text),
                Some(RawBody::Bytes(bytes)) => builder = builder.body(bytes),
                Some(RawBody::Multipart(parts)) => {
                    let mut form = reqwest::multipart::Form::new();
                    for (name, value) in parts {
                        form = form.text(name, value);
                    }
                    builder = builder.multipart(form);
                }
            }

            let response = builder.send().await.map_err(map_error)?;

            let status = response.status().as_u16();
            let url = response.url().clone();
            let mut headers = Headers::new();
            for (name, value) in response.headers() {
                let Ok(value) = value.to_str() else {
                    continue;
                };
                // Duplicate response headers collapse the way fetch's
                // Headers.get reports them.
                match headers.get(name.as_str()) {
                    Some(prev) => {
                        let joined = format!("{prev}, {value}");
                        headers.set(name.as_str(), joined);
                    }
                    None => headers.set(name.as_str(), value),
                }
            }
            let body = response.bytes().await.map_err(map_error)?.to_vec();

            Ok(Response::new(status, url, headers, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_spellings_match_the_wire() {
        assert_eq!(CacheMode::OnlyIfCached.as_str(), "only-if-cached");
        assert_eq!(CredentialsMode::SameOrigin.as_str(), "same-origin");
        assert_eq!(RequestMode::NoCors.as_str(), "no-cors");
        assert_eq!(RedirectMode::Manual.as_str(), "manual");
        assert_eq!(
            ReferrerPolicy::StrictOriginWhenCrossOrigin.as_str(),
            "strict-origin-when-cross-origin"
        );
    }

    #[test]
    fn options_default_to_unset() {
        let options = TransportOptions::default();
        assert_eq!(options, TransportOptions::default());
        assert!(options.cache.is_none());
        assert!(options.redirect.is_none());
        assert!(options.keepalive.is_none());
    }
}
