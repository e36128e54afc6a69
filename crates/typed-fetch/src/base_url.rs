//! Base URL handling

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

/// Base URL error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// The base URL must be absolute with a host
    #[error("Invalid base URL")]
    InvalidBaseUrl,
}

/// Absolute root that relative call paths are resolved against.
///
/// Normalized on construction: trailing slashes are stripped from the path
/// and any query or fragment is dropped, so the base always names a
/// directory root. The per-call query owns the composed URL's `?` entirely.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Parse and normalize an absolute base URL.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut url = Url::parse(input)?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(Error::InvalidBaseUrl);
        }
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }

    /// Resolve a per-call path against this base.
    ///
    /// A path that parses as an absolute URL replaces the base entirely.
    /// Anything else is appended below the base path with exactly one `/`
    /// between them; the base is always treated as a directory root, so
    /// a leading slash on the path does not climb back to the origin.
    /// `""` and `"/"` resolve to the base itself.
    pub fn join(&self, path: &str) -> Result<Url, Error> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }

        let root = self.0.as_str().trim_end_matches('/');
        let tail = path.trim_start_matches('/');
        if tail.is_empty() {
            return Ok(self.0.clone());
        }
        Ok(Url::parse(&format!("{root}/{tail}"))?)
    }

    /// The normalized base as a [`Url`].
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl FromStr for BaseUrl {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BaseUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}
