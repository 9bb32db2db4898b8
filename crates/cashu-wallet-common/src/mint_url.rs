//! Url

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

use crate::ensure_cashu;

/// Url Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Invalid URL structure
    #[error("Invalid URL")]
    InvalidUrl,
}

/// MintUrl Url
///
/// Normalized so that two spellings of the same mint compare equal: scheme and host are
/// lowercased and trailing slashes are removed. The path keeps its case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MintUrl(String);

impl Serialize for MintUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MintUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl MintUrl {
    fn format_url(url: &str) -> Result<String, Error> {
        let url = url.trim().trim_end_matches('/');
        ensure_cashu!(!url.is_empty(), Error::InvalidUrl);

        let parsed = Url::parse(url)?;
        ensure_cashu!(
            matches!(parsed.scheme(), "http" | "https"),
            Error::InvalidUrl
        );
        let host = parsed.host_str().ok_or(Error::InvalidUrl)?;

        // `Url` lowercases scheme and host but keeps the path as written
        let mut formatted_url = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            formatted_url.push_str(&format!(":{port}"));
        }
        let path = parsed.path().trim_end_matches('/');
        if !path.is_empty() {
            formatted_url.push_str(path);
        }
        Ok(formatted_url)
    }

    /// Url as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Self::format_url(url).map(Self)
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
