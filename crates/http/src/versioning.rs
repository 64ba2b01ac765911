//! API version negotiation through the `Accept` header.
//!
//! Clients ask for a response shape with a media-type parameter, for example
//! `Accept: application/json; version=2.0`. Requests without one fall back to
//! the configured default.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::ACCEPT, request::Parts, HeaderMap},
};

use crate::error::AppError;

/// Dotted numeric API version such as `1.0` or `2.1`.
///
/// Missing trailing components compare as zero, so `2` equals `2.0`.
#[derive(Debug, Clone, Eq)]
pub struct ApiVersion {
    raw: String,
    parts: Vec<u64>,
}

impl ApiVersion {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for ApiVersion {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(AppError::bad_request("API version must not be empty"));
        }

        let parts = raw
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| AppError::bad_request(format!("invalid API version '{raw}'")))?;

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let left = self.parts.get(i).copied().unwrap_or(0);
                let right = other.parts.get(i).copied().unwrap_or(0);
                left.cmp(&right)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ApiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves the requested version for a request.
#[derive(Debug, Clone)]
pub struct Versioning {
    default_version: Option<ApiVersion>,
}

impl Versioning {
    /// Build a resolver; an empty default means "no version" for clients that
    /// do not ask for one.
    pub fn new(default_version: &str) -> Result<Self, AppError> {
        let default_version = if default_version.trim().is_empty() {
            None
        } else {
            Some(default_version.parse()?)
        };
        Ok(Self { default_version })
    }

    pub fn version(&self, headers: &HeaderMap) -> Result<Option<ApiVersion>, AppError> {
        for value in headers.get_all(ACCEPT) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if let Some(raw) = version_param(value) {
                return raw.parse().map(Some);
            }
        }
        Ok(self.default_version.clone())
    }
}

/// Extract the `version` media-type parameter from an `Accept` header value.
fn version_param(accept: &str) -> Option<&str> {
    accept
        .split(',')
        .flat_map(|media_range| media_range.split(';').skip(1))
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("version"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Extractor yielding the version negotiated for the current request.
#[derive(Debug, Clone)]
pub struct RequestedVersion(pub Option<ApiVersion>);

impl<S> FromRequestParts<S> for RequestedVersion
where
    Versioning: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let versioning = Versioning::from_ref(state);
        versioning.version(&parts.headers).map(RequestedVersion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn v(raw: &str) -> ApiVersion {
        raw.parse().unwrap()
    }

    #[test]
    fn versions_compare_numerically() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.0"));
        assert_eq!(v("2"), v("2.0"));
        assert!(v("1.0") < v("2.0"));
    }

    #[test]
    fn garbage_versions_are_rejected() {
        assert!("two".parse::<ApiVersion>().is_err());
        assert!("".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn version_is_read_from_accept_parameter() {
        let versioning = Versioning::new("1.0").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json; version=2.0"),
        );

        let version = versioning.version(&headers).unwrap();
        assert_eq!(version.unwrap().as_str(), "2.0");
    }

    #[test]
    fn missing_parameter_falls_back_to_default() {
        let versioning = Versioning::new("1.0").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        assert_eq!(versioning.version(&headers).unwrap(), Some(v("1.0")));
        assert_eq!(Versioning::new("").unwrap().version(&headers).unwrap(), None);
    }

    #[test]
    fn malformed_requested_version_is_a_bad_request() {
        let versioning = Versioning::new("1.0").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json; version=x"));

        assert!(matches!(
            versioning.version(&headers),
            Err(AppError::BadRequest(_))
        ));
    }
}
