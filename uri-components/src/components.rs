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

//! Immutable hierarchical URI representation

use http::Uri;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::encoding::{encode_uri_component, verify_uri_component, UriComponentType};
use crate::path::{clean_path, PathComponent};
use crate::template::{expand_optional, expand_uri_component, UriTemplateVariables};
use crate::{
    Charset, LinkedMultiValueMap, MapTemplateVariables, UriComponentsBuilder, UriError,
    VarArgsTemplateVariables,
};

/// Query parameters, a parameter without value is stored as `None`
pub type QueryParams = LinkedMultiValueMap<String, Option<String>>;

/// A URI split up into its parts. Instances are created by [`UriComponentsBuilder`] and never
/// change, operations like [`UriComponents::encode`] produce new instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriComponents {
    scheme: Option<String>,
    user_info: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: PathComponent,
    query_params: QueryParams,
    fragment: Option<String>,
    encoded: bool,
}

impl UriComponents {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scheme: Option<String>,
        user_info: Option<String>,
        host: Option<String>,
        port: Option<u16>,
        path: PathComponent,
        query_params: QueryParams,
        fragment: Option<String>,
        encoded: bool,
    ) -> Self {
        Self {
            scheme,
            user_info,
            host,
            port,
            path,
            query_params,
            fragment,
            encoded,
        }
    }

    /// URI scheme like `https`
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// User information preceding the host
    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    /// Host name or IP address, IPv6 addresses include the brackets
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Explicitly specified port
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The path as a string, empty if there is no path
    pub fn path(&self) -> Cow<'_, str> {
        self.path.path()
    }

    /// The non-empty path segments
    pub fn path_segments(&self) -> Cow<'_, [String]> {
        self.path.path_segments()
    }

    /// The path in the form it was built with
    pub fn path_component(&self) -> &PathComponent {
        &self.path
    }

    /// Query parameters in the order they were added
    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// The query string assembled from the query parameters, `None` if there are none
    pub fn query(&self) -> Option<String> {
        if self.query_params.is_empty() {
            return None;
        }

        let mut query = String::new();
        for (name, values) in self.query_params.iter() {
            if values.is_empty() {
                append_query_param(&mut query, name, None);
            }
            for value in values {
                append_query_param(&mut query, name, value.as_deref());
            }
        }
        Some(query)
    }

    /// Fragment identifier
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Whether the parts are percent-encoded already
    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// Percent-encodes all parts, using the character set for non-ASCII characters. Each part
    /// is encoded according to the characters allowed in it. Encoding already encoded
    /// components produces an identical copy.
    pub fn encode(&self, charset: Charset) -> Self {
        if self.encoded {
            return self.clone();
        }

        let encode_optional = |value: &Option<String>, component| {
            value
                .as_deref()
                .map(|value| encode_uri_component(value, charset, component).into_owned())
        };

        let host_type = self
            .host
            .as_deref()
            .map_or(UriComponentType::HostIpv4, UriComponentType::for_host);

        let query_params = self
            .query_params
            .iter()
            .map(|(name, values)| {
                (
                    encode_uri_component(name, charset, UriComponentType::QueryParamName)
                        .into_owned(),
                    values
                        .iter()
                        .map(|value| encode_optional(value, UriComponentType::QueryParamValue))
                        .collect::<Vec<_>>(),
                )
            })
            .fold(QueryParams::new(), |mut params, (name, values)| {
                params.add_all(name, values);
                params
            });

        Self {
            scheme: encode_optional(&self.scheme, UriComponentType::Scheme),
            user_info: encode_optional(&self.user_info, UriComponentType::UserInfo),
            host: encode_optional(&self.host, host_type),
            port: self.port,
            path: self.path.encode(charset),
            query_params,
            fragment: encode_optional(&self.fragment, UriComponentType::Fragment),
            encoded: true,
        }
    }

    /// Checks that every part only contains characters allowed in it and valid escape
    /// sequences.
    pub fn verify(&self) -> Result<(), UriError> {
        let verify_optional = |value: &Option<String>, component| {
            value
                .as_deref()
                .map_or(Ok(()), |value| verify_uri_component(value, component))
        };

        verify_optional(&self.scheme, UriComponentType::Scheme)?;
        verify_optional(&self.user_info, UriComponentType::UserInfo)?;
        if let Some(host) = &self.host {
            verify_uri_component(host, UriComponentType::for_host(host))?;
        }
        self.path.verify()?;
        for (name, values) in self.query_params.iter() {
            verify_uri_component(name, UriComponentType::QueryParamName)?;
            for value in values {
                verify_optional(value, UriComponentType::QueryParamValue)?;
            }
        }
        verify_optional(&self.fragment, UriComponentType::Fragment)
    }

    /// Replaces `{name}` placeholders in all parts, processing scheme, user info, host, path,
    /// query and fragment in this order.
    pub fn expand(&self, variables: &mut dyn UriTemplateVariables) -> Result<Self, UriError> {
        if self.encoded {
            return Err(UriError::ExpandEncoded);
        }

        let scheme = expand_optional(&self.scheme, variables)?;
        let user_info = expand_optional(&self.user_info, variables)?;
        let host = expand_optional(&self.host, variables)?;
        let path = self.path.expand(variables)?;

        let mut query_params = QueryParams::with_capacity(self.query_params.len());
        for (name, values) in self.query_params.iter() {
            let name = expand_uri_component(name, variables)?.into_owned();
            let values = values
                .iter()
                .map(|value| expand_optional(value, variables))
                .collect::<Result<Vec<_>, _>>()?;
            query_params.add_all(name, values);
        }

        let fragment = expand_optional(&self.fragment, variables)?;

        Ok(Self {
            scheme,
            user_info,
            host,
            port: self.port,
            path,
            query_params,
            fragment,
            encoded: false,
        })
    }

    /// Replaces placeholders by the values in order of appearance.
    pub fn expand_values<V: Display>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, UriError> {
        self.expand(&mut VarArgsTemplateVariables::new(values))
    }

    /// Replaces placeholders by the values from the map.
    pub fn expand_map<V: Display>(&self, values: &HashMap<String, V>) -> Result<Self, UriError> {
        self.expand(&mut MapTemplateVariables::new(values))
    }

    /// Resolves `.` and `..` segments within the path. The result has a full path.
    pub fn normalize(&self) -> Self {
        let path = if self.path.is_empty() {
            PathComponent::Empty
        } else {
            PathComponent::FullPath(clean_path(&self.path.path()))
        };
        Self {
            path,
            ..self.clone()
        }
    }

    /// Assembles the URI string from the parts as they are, without encoding.
    pub fn to_uri_string(&self) -> String {
        let mut result = String::new();
        if let Some(scheme) = &self.scheme {
            result.push_str(scheme);
            result.push(':');
        }

        let has_authority = self.user_info.is_some() || self.host.is_some();
        if has_authority {
            result.push_str("//");
            if let Some(user_info) = &self.user_info {
                result.push_str(user_info);
                result.push('@');
            }
            if let Some(host) = &self.host {
                result.push_str(host);
            }
            if let Some(port) = self.port {
                result.push(':');
                result.push_str(&port.to_string());
            }
        }

        let path = self.path.path();
        if !path.is_empty() {
            if has_authority && !path.starts_with('/') {
                result.push('/');
            }
            result.push_str(&path);
        }

        if let Some(query) = self.query() {
            result.push('?');
            result.push_str(&query);
        }

        if let Some(fragment) = &self.fragment {
            result.push('#');
            result.push_str(fragment);
        }
        result
    }

    /// Converts into an [`http::Uri`], encoding with UTF-8 first if necessary. `http::Uri` has
    /// no fragment, so it is dropped.
    pub fn to_uri(&self) -> Result<Uri, UriError> {
        let components = self.encode(Charset::Utf8);
        let components = Self {
            fragment: None,
            ..components
        };
        let uri = components.to_uri_string();
        uri.parse().map_err(|err: http::uri::InvalidUri| UriError::InvalidUri {
            reason: err.to_string(),
            uri,
        })
    }

    /// Transfers all parts into the builder.
    pub fn copy_to_builder(&self, builder: &mut UriComponentsBuilder) {
        if let Some(scheme) = &self.scheme {
            builder.scheme(scheme);
        }
        if let Some(user_info) = &self.user_info {
            builder.user_info(user_info);
        }
        if let Some(host) = &self.host {
            builder.host(host);
        }
        builder.port(self.port);
        self.path.copy_to_builder(builder);
        for (name, values) in self.query_params.iter() {
            builder.query_param_values(name, values.iter().cloned());
        }
        if let Some(fragment) = &self.fragment {
            builder.fragment(fragment);
        }
    }
}

fn append_query_param(query: &mut String, name: &str, value: Option<&str>) {
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(name);
    if let Some(value) = value {
        query.push('=');
        query.push_str(value);
    }
}

impl Display for UriComponents {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_uri_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn encode() {
        let components = UriComponentsBuilder::new()
            .scheme("http")
            .host("exämple.com")
            .path("/a b/c")
            .path_segment(["d/e", "f"])
            .query_param("q", ["x y&z"])
            .fragment("frag ment")
            .build();
        assert!(!components.is_encoded());
        assert!(components.verify().is_err());

        let encoded = components.encode(Charset::Utf8);
        assert!(encoded.is_encoded());
        assert_eq!(encoded.verify(), Ok(()));
        assert_eq!(
            encoded.to_uri_string(),
            "http://ex%C3%A4mple.com/a%20b/c/d%2Fe/f?q=x%20y%26z#frag%20ment"
        );

        // Encoding twice doesn’t escape again
        assert_eq!(encoded.encode(Charset::Utf8), encoded);
    }

    #[test]
    fn encode_ipv6_host() {
        let components = UriComponentsBuilder::new()
            .scheme("http")
            .host("[::1]")
            .port(8080)
            .path("/")
            .build()
            .encode(Charset::Utf8);
        assert_eq!(components.to_uri_string(), "http://[::1]:8080/");
    }

    #[test]
    fn expand() {
        let components = UriComponentsBuilder::from_uri_string("{scheme}://{host}/{p}?{n}={v}#{f}")
            .unwrap()
            .build();
        let expanded = components
            .expand_values(["https", "example.com", "path", "name", "value", "top"])
            .unwrap();
        assert_eq!(
            expanded.to_uri_string(),
            "https://example.com/path?name=value#top"
        );

        assert_eq!(
            components.expand_values(["https"]),
            Err(UriError::NotEnoughVariableValues {
                name: "host".to_owned()
            })
        );

        let values = HashMap::from([("id".to_owned(), "1 2")]);
        let expanded = UriComponentsBuilder::from_path("/items/{id}")
            .build()
            .expand_map(&values)
            .unwrap();
        assert_eq!(expanded.path(), "/items/1 2");
        assert_eq!(expanded.encode(Charset::Utf8).path(), "/items/1%202");

        assert_eq!(
            components.encode(Charset::Utf8).expand_values(["x"]),
            Err(UriError::ExpandEncoded)
        );
    }

    #[test]
    fn normalize() {
        let components = UriComponentsBuilder::from_uri_string("http://example.com/a/./b/../c?x")
            .unwrap()
            .build();
        let normalized = components.normalize();
        assert_eq!(normalized.to_uri_string(), "http://example.com/a/c?x");
        assert_eq!(
            normalized.path_component(),
            &PathComponent::FullPath("/a/c".to_owned())
        );
    }

    #[test]
    fn uri_string() {
        let components = UriComponentsBuilder::new()
            .scheme("https")
            .user_info("user")
            .host("example.com")
            .port(8443)
            .path("relative")
            .query("a=1&b&c=")
            .build();
        assert_eq!(
            components.to_uri_string(),
            "https://user@example.com:8443/relative?a=1&b&c="
        );
        assert_eq!(components.to_string(), components.to_uri_string());

        let components = UriComponentsBuilder::from_path("/only/path").build();
        assert_eq!(components.to_uri_string(), "/only/path");
        assert_eq!(components.query(), None);
    }

    #[test]
    fn to_uri() {
        let components = UriComponentsBuilder::new()
            .scheme("https")
            .host("example.com")
            .path("/a b")
            .query_param("x", ["1"])
            .fragment("dropped")
            .build();
        let uri = components.to_uri().unwrap();
        assert_eq!(uri.scheme_str(), Some("https"));
        assert_eq!(uri.host(), Some("example.com"));
        assert_eq!(uri.path(), "/a%20b");
        assert_eq!(uri.query(), Some("x=1"));
    }

    #[test]
    fn copy_to_builder() {
        let components = UriComponentsBuilder::from_uri_string("http://u@host:81/a/b?x=1&x=2&y#f")
            .unwrap()
            .build();
        let mut builder = UriComponentsBuilder::new();
        components.copy_to_builder(&mut builder);
        assert_eq!(builder.build(), components);
    }
}
