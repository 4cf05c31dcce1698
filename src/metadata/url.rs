//! Route and query template parsing.
//!
//! A route template is `/`-delimited; a segment starting with `:` is a named
//! placeholder. A query template is `&`-delimited with the same placeholder
//! rule. Parsing pairs every placeholder, path first then query, each left
//! to right, with the next entry of the action's declared parameter types.

use crate::binder::ParamType;
use crate::error::Error;

/// One token of a route or query template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UrlToken {
    Literal(String),
    Placeholder(String),
}

impl UrlToken {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(name) => Self::Placeholder(name.to_owned()),
            None => Self::Literal(raw.to_owned()),
        }
    }
}

/// Where a parameter's raw value comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterSource {
    Segment,
    QueryStringVariable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteParameter {
    name: String,
    data_type: ParamType,
    source: ParameterSource,
}

impl RouteParameter {
    pub fn name(&self) -> &str { &self.name }
    pub fn data_type(&self) -> ParamType { self.data_type }
    pub fn source(&self) -> ParameterSource { self.source }
}

/// The parsed form of an action's route and query templates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionUrl {
    segments: Vec<UrlToken>,
    query_string: Vec<UrlToken>,
    parameters: Vec<RouteParameter>,
}

/// Declared type for a placeholder that has no matching entry.
const UNDECLARED: ParamType = ParamType::Other("undefined");

impl ActionUrl {
    /// Parses `route` and `query` against the owning action's declared
    /// parameter types. `None` for `parameters` means there is no owning
    /// action and fails with [`Error::MissingActionType`].
    ///
    /// ```rust
    /// use keel::ParamType;
    /// use keel::metadata::{ActionUrl, ParameterSource};
    ///
    /// let url = ActionUrl::parse(
    ///     Some("action/:var1/:var2"),
    ///     Some(":var3&:var4"),
    ///     Some(&[ParamType::Number, ParamType::Text, ParamType::Boolean, ParamType::Date]),
    /// ).unwrap();
    ///
    /// let names: Vec<_> = url.parameters().iter().map(|p| p.name()).collect();
    /// assert_eq!(names, ["var1", "var2", "var3", "var4"]);
    /// assert_eq!(url.parameters()[2].source(), ParameterSource::QueryStringVariable);
    /// ```
    pub fn parse(route: Option<&str>, query: Option<&str>, parameters: Option<&[ParamType]>) -> Result<Self, Error> {
        let declared = parameters.ok_or(Error::MissingActionType)?;

        let segments: Vec<UrlToken> = split_tokens(route, &['/', '?']);
        let query_string: Vec<UrlToken> = split_tokens(query, &['?', '&']);

        let mut types = declared.iter().copied();
        let mut next_type = || types.next().unwrap_or(UNDECLARED);

        let mut params = Vec::new();
        for (tokens, source) in [
            (&segments, ParameterSource::Segment),
            (&query_string, ParameterSource::QueryStringVariable),
        ] {
            for token in tokens {
                if let UrlToken::Placeholder(name) = token {
                    params.push(RouteParameter { name: name.clone(), data_type: next_type(), source });
                }
            }
        }

        Ok(Self { segments, query_string, parameters: params })
    }

    pub fn segments(&self) -> &[UrlToken] { &self.segments }
    pub fn query_string(&self) -> &[UrlToken] { &self.query_string }
    pub fn parameters(&self) -> &[RouteParameter] { &self.parameters }
}

fn split_tokens(template: Option<&str>, delimiters: &[char]) -> Vec<UrlToken> {
    template
        .unwrap_or("")
        .split(delimiters)
        .filter(|part| !part.is_empty())
        .map(UrlToken::parse)
        .collect()
}

// ── Route strings ─────────────────────────────────────────────────────────────

/// Strips one trailing `/` from a controller prefix. `None` is the root.
pub fn normalize_prefix(route: Option<&str>) -> String {
    let route = route.unwrap_or("");
    route.strip_suffix('/').unwrap_or(route).to_owned()
}

/// Joins a controller prefix and an action suffix, inserting `/` only when
/// neither side supplies one. An empty suffix adds nothing.
///
/// ```rust
/// use keel::metadata::merge_route;
///
/// assert_eq!(merge_route("users", ":id"), "users/:id");
/// assert_eq!(merge_route("users/", "/:id"), "users/:id");
/// assert_eq!(merge_route("", "health"), "/health");
/// ```
pub fn merge_route(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return prefix.to_owned();
    }
    match (prefix.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{prefix}{}", &suffix[1..]),
        (false, false) => format!("{prefix}/{suffix}"),
        _ => format!("{prefix}{suffix}"),
    }
}

/// Turns a merged route into the path mounted on the radix router: rooted
/// at `/`, with `:name` segments rewritten to `{name}`.
pub(crate) fn to_router_path(route: &str) -> String {
    let mut path = String::with_capacity(route.len() + 1);
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        match segment.strip_prefix(':') {
            Some(name) => {
                path.push('{');
                path.push_str(name);
                path.push('}');
            }
            None => path.push_str(segment),
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}
