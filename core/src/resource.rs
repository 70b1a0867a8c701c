//! Site roots, endpoint references and resource paths.
//!
//! # Design
//! The backend addresses every record by a server-relative resource path of
//! the fixed shape `/api/v1/{resource-kind}/{id}/`. Splitting that path on
//! `/` gives `["", "api", "v1", kind, id, ""]`, so the numeric ID is always
//! segment 4. This positional rule is part of the wire protocol and is not
//! inferred from the path contents.
//!
//! Records keep paths relative; they are only resolved into full URLs, via
//! `SiteConfig`, when a call is built.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;

/// Segment of a resource path that holds the record ID.
const ID_SEGMENT: usize = 4;

/// Relative root of the REST API under the site root.
const API_PATH: &str = "/api/v1/";

/// The site root and the API root derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    site_root: Url,
    api_root: Url,
}

impl SiteConfig {
    pub fn new(site_root: &str) -> Result<Self, ApiError> {
        let site_root = Url::parse(site_root)?;
        if site_root.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("{site_root} cannot be a base")));
        }
        let api_root = site_root.join(API_PATH)?;
        Ok(Self { site_root, api_root })
    }

    pub fn site_root(&self) -> &Url {
        &self.site_root
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }
}

/// A fully resolved request target. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Resolve `relative` against the site root, e.g. `groups/login/`.
    pub fn site(site: &SiteConfig, relative: &str) -> Result<Self, ApiError> {
        Ok(Self(site.site_root.join(relative)?))
    }

    /// Resolve `relative` against the API root, e.g. `employees/`.
    pub fn api(site: &SiteConfig, relative: &str) -> Result<Self, ApiError> {
        Ok(Self(site.api_root.join(relative)?))
    }

    /// Resolve a record's resource path against the site root.
    pub fn resource(site: &SiteConfig, path: &ResourcePath) -> Result<Self, ApiError> {
        Self::site(site, path.as_str())
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Url> for Endpoint {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A server-relative path identifying one resource, e.g.
/// `/api/v1/employees/5/` or `/media/profile.jpg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Validate a path string. Empty strings, strings with whitespace and
    /// strings that cannot be joined onto a base URL are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return None;
        }
        let base = Url::parse("http://localhost/").ok()?;
        base.join(raw).ok()?;
        Some(Self(raw.to_string()))
    }

    /// Path for record `id` of the collection `kind`, e.g.
    /// `for_record("employee-groups", 2)` is `/api/v1/employee-groups/2/`.
    pub fn for_record(kind: &str, id: u64) -> Self {
        Self(format!("{API_PATH}{kind}/{id}/"))
    }

    /// The numeric ID held in segment 4 of the path, if there is one.
    pub fn id(&self) -> Option<u64> {
        self.0.split('/').nth(ID_SEGMENT)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("malformed resource path: {raw:?}"))
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
