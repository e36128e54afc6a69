//! Client errors

use thiserror::Error;

use crate::response::Response;
use crate::transport::TransportError;

/// Everything that can go wrong between composing a request and handing
/// back decoded data.
///
/// Variants that fire after a response arrived carry that [`Response`] so
/// callers can still inspect status and headers on the failure path.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be composed
    #[error("Could not build request: {0}")]
    Build(String),
    /// The transport failed before any response arrived
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server answered with a non-success status
    #[error("Unexpected HTTP status {}", .response.status())]
    Status {
        /// The non-success response
        response: Response,
    },
    /// The response body could not be decoded
    #[error("Could not decode response body: {source}")]
    Decode {
        /// The response whose body failed to decode
        response: Response,
        /// Decode failure
        source: serde_json::Error,
    },
    /// The decoded payload was rejected by the caller's validator
    #[error("Response validation failed: {message}")]
    Validation {
        /// The response whose payload was rejected
        response: Response,
        /// What the validator objected to
        message: String,
    },
}

impl Error {
    /// The response attached to this error, if one arrived at all.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status { response }
            | Self::Decode { response, .. }
            | Self::Validation { response, .. } => Some(response),
            Self::Build(_) | Self::Transport(_) => None,
        }
    }

    /// Take ownership of the attached response, if any.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Status { response }
            | Self::Decode { response, .. }
            | Self::Validation { response, .. } => Some(response),
            Self::Build(_) | Self::Transport(_) => None,
        }
    }

    /// HTTP status of the attached response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }
}

impl From<crate::base_url::Error> for Error {
    fn from(err: crate::base_url::Error) -> Self {
        Self::Build(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Build(err.to_string())
    }
}
