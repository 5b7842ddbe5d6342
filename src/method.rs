//! Route method tokens.
//!
//! The route table speaks a deliberately small vocabulary: five HTTP methods
//! plus `all`. Tokens are case-insensitive (`GET /ping` and `get /ping` are the
//! same route). Anything else is a configuration error, caught at startup.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The method a compiled route is registered under.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RouteMethod {
    All,
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl RouteMethod {
    /// Every recognised token, in the order they are documented.
    pub const ALL: [RouteMethod; 6] = [
        Self::All,
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
    ];

    /// Returns the lower-case route-table token (e.g. `"get"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All    => "all",
            Self::Delete => "delete",
            Self::Get    => "get",
            Self::Patch  => "patch",
            Self::Post   => "post",
            Self::Put    => "put",
        }
    }

    /// Whether a request with `method` can be served by a route registered
    /// under `self`. `All` accepts anything; `Get` also serves `HEAD`.
    pub fn matches(self, method: &http::Method) -> bool {
        match self {
            Self::All    => true,
            Self::Delete => *method == http::Method::DELETE,
            Self::Get    => *method == http::Method::GET || *method == http::Method::HEAD,
            Self::Patch  => *method == http::Method::PATCH,
            Self::Post   => *method == http::Method::POST,
            Self::Put    => *method == http::Method::PUT,
        }
    }

    /// The wire methods this token stands for, used to build `Allow` headers.
    pub(crate) fn wire(self) -> Vec<http::Method> {
        match self {
            Self::All    => vec![
                http::Method::GET,
                http::Method::HEAD,
                http::Method::POST,
                http::Method::PUT,
                http::Method::DELETE,
                http::Method::PATCH,
            ],
            Self::Delete => vec![http::Method::DELETE],
            Self::Get    => vec![http::Method::GET, http::Method::HEAD],
            Self::Patch  => vec![http::Method::PATCH],
            Self::Post   => vec![http::Method::POST],
            Self::Put    => vec![http::Method::PUT],
        }
    }
}

/// Parses a route-table token. Case-insensitive.
impl FromStr for RouteMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all"    => Ok(Self::All),
            "delete" => Ok(Self::Delete),
            "get"    => Ok(Self::Get),
            "patch"  => Ok(Self::Patch),
            "post"   => Ok(Self::Post),
            "put"    => Ok(Self::Put),
            other    => Err(ConfigError::InvalidMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
