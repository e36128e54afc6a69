//! Typed HTTP requests over a pluggable fetch-style transport
//!
//! This crate wraps a single injected transport primitive with request
//! composition (base URL joining, query encoding, header merging,
//! content-type-driven body serialization) and response mapping
//! (content-type-driven decoding, optional validation). Every call comes
//! back as a [`FetchResult`]: decoded data with its response, or a
//! classified [`Error`]. Nothing here panics or throws past the caller.
//!
//! # Example
//!
//! ```no_run
//! use serde::Deserialize;
//! use typed_fetch::{Client, Error};
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn example() -> Result<(), Error> {
//!     let client = Client::builder("https://api.example.com")
//!         .default_header("Content-Type", "application/json")
//!         .build()?;
//!     let user = client.get("users/3").send_as::<User>().await?;
//!     println!("user {} is {}", user.data.id, user.data.name);
//!     Ok(())
//! }
//! ```

mod base_url;
mod client;
mod error;
mod headers;
mod request;
mod response;
mod transport;

pub use base_url::{BaseUrl, Error as BaseUrlError};
pub use client::{CallBuilder, Client, ClientBuilder};
pub use error::Error;
pub use headers::Headers;
pub use request::{Body, Method, Query, RawBody, Request, UnknownMethod};
pub use response::{Fetched, FetchResult, Payload, Response};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{
    CacheMode, CredentialsMode, RedirectMode, ReferrerPolicy, RequestMode, Transport,
    TransportError, TransportOptions,
};
