// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Builder accumulating URI parts and parsing URI strings

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

use crate::components::QueryParams;
use crate::path::{PathComponent, PATH_DELIMITER};
use crate::{Charset, UriComponents, UriError};

static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:(?P<scheme>[^:/?#]+):)?",
        r"(?P<authority>//(?:(?P<user_info>[^@\[/?#]*)@)?",
        r"(?P<host>\[[0-9A-Fa-f:.]*[%0-9A-Za-z]*\]|[^\[/?#:]*)",
        r"(?::(?P<port>[^/?#]*))?)?",
        r"(?P<path>[^?#]*)",
        r"(?:\?(?P<query>[^#]*))?",
        r"(?:#(?P<fragment>.*))?",
    ))
    .unwrap()
});

static QUERY_PARAM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^&=]+)(=?)([^&]+)?").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPart {
    Full(String),
    Segments(Vec<String>),
}

/// Collapses duplicate delimiters: `a//b` becomes `a/b`.
fn sanitize_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c != PATH_DELIMITER || !result.ends_with(PATH_DELIMITER) {
            result.push(c);
        }
    }
    result
}

/// Mutable accumulator for URI parts. Setters return the builder, so that calls can be chained:
///
/// ```rust
/// use uri_components::{Charset, UriComponentsBuilder};
///
/// let uri = UriComponentsBuilder::new()
///     .scheme("https")
///     .host("example.com")
///     .path("/docs")
///     .path_segment(["a b"])
///     .query_param("q", ["1"])
///     .build()
///     .encode(Charset::Utf8)
///     .to_uri_string();
/// assert_eq!(uri, "https://example.com/docs/a%20b?q=1");
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UriComponentsBuilder {
    scheme: Option<String>,
    user_info: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path_parts: Vec<PathPart>,
    query_params: QueryParams,
    fragment: Option<String>,
}

impl UriComponentsBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given path.
    pub fn from_path(path: &str) -> Self {
        let mut builder = Self::new();
        builder.path(path);
        builder
    }

    /// Creates a builder seeded with all parts of the URI components.
    pub fn from_components(components: &UriComponents) -> Self {
        let mut builder = Self::new();
        components.copy_to_builder(&mut builder);
        builder
    }

    /// Parses a URI string into its parts. The string is expected to be unencoded but
    /// existing escape sequences are taken over as is.
    pub fn from_uri_string(uri: &str) -> Result<Self, UriError> {
        let invalid = |reason: &str| UriError::InvalidUri {
            uri: uri.to_owned(),
            reason: reason.to_owned(),
        };

        let captures = URI_PATTERN
            .captures(uri)
            .ok_or_else(|| invalid("unexpected structure"))?;
        let group = |name| captures.name(name).map(|m| m.as_str());

        let mut builder = Self::new();
        builder.scheme = group("scheme").map(ToOwned::to_owned);
        if group("authority").is_some() {
            builder.user_info = group("user_info").map(ToOwned::to_owned);
            builder.host = group("host").map(ToOwned::to_owned);
            if let Some(port) = group("port").filter(|port| !port.is_empty()) {
                builder.port = Some(port.parse().map_err(|_| invalid("invalid port"))?);
            }
        }
        if let Some(path) = group("path") {
            builder.path(path);
        }
        if let Some(query) = group("query") {
            builder.query(query);
        }
        if let Some(fragment) = group("fragment") {
            builder.fragment(fragment);
        }

        trace!("parsed URI {uri} into {builder:?}");
        Ok(builder)
    }

    /// Parses an absolute HTTP URL. Unlike [`UriComponentsBuilder::from_uri_string`] this
    /// requires an `http` or `https` scheme and a host.
    pub fn from_http_url(url: &str) -> Result<Self, UriError> {
        let builder = Self::from_uri_string(url)?;
        let is_http = builder.scheme.as_deref().is_some_and(|scheme| {
            scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
        });
        if !is_http {
            return Err(UriError::InvalidUri {
                uri: url.to_owned(),
                reason: "not an HTTP URL".to_owned(),
            });
        }
        if builder.host.as_deref().map_or(true, str::is_empty) {
            return Err(UriError::InvalidUri {
                uri: url.to_owned(),
                reason: "host missing".to_owned(),
            });
        }
        Ok(builder)
    }

    /// Sets the scheme, an empty value removes it.
    pub fn scheme(&mut self, scheme: &str) -> &mut Self {
        self.scheme = non_empty(scheme);
        self
    }

    /// Sets the user information, an empty value removes it.
    pub fn user_info(&mut self, user_info: &str) -> &mut Self {
        self.user_info = non_empty(user_info);
        self
    }

    /// Sets the host, an empty value removes it. IPv6 addresses need to be enclosed in
    /// brackets.
    pub fn host(&mut self, host: &str) -> &mut Self {
        self.host = non_empty(host);
        self
    }

    /// Sets the port, `None` removes it.
    pub fn port(&mut self, port: impl Into<Option<u16>>) -> &mut Self {
        self.port = port.into();
        self
    }

    /// Appends to the path. `/` characters within the value act as delimiters.
    pub fn path(&mut self, path: &str) -> &mut Self {
        if path.trim().is_empty() {
            return self;
        }

        match self.path_parts.last_mut() {
            Some(PathPart::Full(existing)) => existing.push_str(path),
            Some(PathPart::Segments(_)) => {
                let mut full = String::with_capacity(path.len() + 1);
                if !path.starts_with(PATH_DELIMITER) {
                    full.push(PATH_DELIMITER);
                }
                full.push_str(path);
                self.path_parts.push(PathPart::Full(full));
            }
            None => self.path_parts.push(PathPart::Full(path.to_owned())),
        }
        self
    }

    /// Sets the path, replacing anything added previously. `None` removes the path.
    pub fn replace_path(&mut self, path: Option<&str>) -> &mut Self {
        self.path_parts.clear();
        if let Some(path) = path {
            self.path(path);
        }
        self
    }

    /// Appends path segments. A `/` character within a segment is data rather than a
    /// delimiter. Empty segments are ignored.
    pub fn path_segment<S: AsRef<str>>(
        &mut self,
        segments: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let segments = segments
            .into_iter()
            .filter(|segment| !segment.as_ref().trim().is_empty())
            .map(|segment| segment.as_ref().to_owned());

        match self.path_parts.last_mut() {
            Some(PathPart::Segments(existing)) => existing.extend(segments),
            last => {
                if let Some(PathPart::Full(full)) = last {
                    while full.ends_with(PATH_DELIMITER) {
                        full.pop();
                    }
                }
                self.path_parts.push(PathPart::Segments(segments.collect()));
            }
        }
        self
    }

    /// Parses a query string like `a=1&b&c=` and adds its parameters.
    pub fn query(&mut self, query: &str) -> &mut Self {
        for captures in QUERY_PARAM_PATTERN.captures_iter(query) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            let has_equals = captures.get(2).is_some_and(|m| !m.as_str().is_empty());
            let value = match captures.get(3) {
                Some(value) => Some(value.as_str().to_owned()),
                None if has_equals => Some(String::new()),
                None => None,
            };
            self.query_params.add(name.as_str().to_owned(), value);
        }
        self
    }

    /// Sets the query string, replacing all query parameters. `None` removes the query.
    pub fn replace_query(&mut self, query: Option<&str>) -> &mut Self {
        self.query_params.clear();
        if let Some(query) = query {
            self.query(query);
        }
        self
    }

    /// Adds values for a query parameter. Without any values, the parameter is added without
    /// value.
    pub fn query_param<V: Display>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.query_param_values(name, values.into_iter().map(|value| Some(value.to_string())))
    }

    /// Adds values for a query parameter, `None` values render as a parameter without value.
    /// Without any values, the parameter is added without value.
    pub fn query_param_values(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<String>>,
    ) -> &mut Self {
        let mut values = values.into_iter().peekable();
        if values.peek().is_some() {
            self.query_params.add_all(name.into(), values);
        } else {
            self.query_params.add(name.into(), None);
        }
        self
    }

    /// Replaces all values of a query parameter. Without any values the parameter is removed.
    pub fn replace_query_param<V: Display>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        let name = name.into();
        self.query_params.remove(&name);

        let mut values = values.into_iter().peekable();
        if values.peek().is_some() {
            self.query_param(name, values);
        }
        self
    }

    /// Sets the fragment, an empty value removes it.
    pub fn fragment(&mut self, fragment: &str) -> &mut Self {
        self.fragment = non_empty(fragment);
        self
    }

    /// Copies all parts of the URI components into this builder. Parts that are set replace
    /// existing values, the path and query parameters are appended to.
    pub fn uri_components(&mut self, components: &UriComponents) -> &mut Self {
        components.copy_to_builder(self);
        self
    }

    fn build_path(&self) -> PathComponent {
        let mut parts = self.path_parts.iter().filter(|part| match part {
            PathPart::Full(path) => !path.is_empty(),
            PathPart::Segments(segments) => !segments.is_empty(),
        });

        let Some(first) = parts.next() else {
            return PathComponent::Empty;
        };
        let Some(second) = parts.next() else {
            return match first {
                PathPart::Full(path) => PathComponent::FullPath(sanitize_path(path)),
                PathPart::Segments(segments) => PathComponent::Segments(segments.clone()),
            };
        };

        let mut segments = Vec::new();
        for part in [first, second].into_iter().chain(parts) {
            match part {
                PathPart::Full(path) => segments.extend(
                    path.split(PATH_DELIMITER)
                        .filter(|segment| !segment.is_empty())
                        .map(ToOwned::to_owned),
                ),
                PathPart::Segments(list) => segments.extend(list.iter().cloned()),
            }
        }
        PathComponent::Segments(segments)
    }

    fn build_with(&self, encoded: bool) -> UriComponents {
        UriComponents::new(
            self.scheme.clone(),
            self.user_info.clone(),
            self.host.clone(),
            self.port,
            self.build_path(),
            self.query_params.clone(),
            self.fragment.clone(),
            encoded,
        )
    }

    /// Builds URI components from unencoded parts.
    pub fn build(&self) -> UriComponents {
        self.build_with(false)
    }

    /// Builds URI components from parts that are encoded already. Fails if any part contains
    /// characters that aren’t allowed there.
    pub fn build_encoded(&self) -> Result<UriComponents, UriError> {
        let components = self.build_with(true);
        components.verify()?;
        Ok(components)
    }

    /// Builds, encodes with UTF-8 and assembles the URI string.
    pub fn to_uri_string(&self) -> String {
        self.build().encode(Charset::Utf8).to_uri_string()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
