//! HTTP method as a typed enum.
//!
//! Actions bind to exactly four verbs. Any other method string is rejected
//! at the server level with `405 Method Not Allowed` before routing.

use std::fmt;
use std::str::FromStr;

/// The verbs an action can be mounted on.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get    => "GET",
            Self::Post   => "POST",
            Self::Put    => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Picks a verb from an action's method name when the descriptor leaves
    /// it unset: `get` → GET, `post` → POST, and so on. Anything else is GET.
    pub fn by_convention(action_name: &str) -> Self {
        action_name.to_ascii_uppercase().parse().unwrap_or_default()
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET"    => Ok(Self::Get),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _        => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
