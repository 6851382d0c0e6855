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

//! Handler rewriting requests according to forwarding headers

use http::{header, HeaderValue, Uri};
use log::{debug, trace};
use std::collections::HashMap;
use uri_components::{verify_uri_component, UriComponentType, UriComponentsBuilder};
use xff_module_utils::request_util::first_value_token;
use xff_module_utils::{
    default_port, split_host_port, Error, RequestFilter, RequestFilterResult, RequestWrapper,
    UrlPathHelper,
};

use crate::configuration::{ForwardedHeaderDefaults, ForwardedHeadersConf};
use crate::header::ForwardedHeader;
use crate::parser::{node_name, ForwardedElement};

/// Request properties as seen by the client before any proxies got involved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedResolution {
    /// Effective scheme, lower-cased if it came from a forwarding header
    pub scheme: String,
    /// Effective host, IPv6 addresses are enclosed in brackets
    pub host: Option<String>,
    /// Effective port, `None` if it is the default port for the scheme
    pub port: Option<u16>,
    /// Normalized `X-Forwarded-Prefix` value
    pub prefix: Option<String>,
    /// The context path to be used for the request
    pub context_path: String,
    /// Client address from `Forwarded: for=` or `X-Forwarded-For`
    pub client: Option<String>,
    /// The rewritten request URI
    pub uri: Uri,
}

impl ForwardedResolution {
    /// Value to be used for the `Host` header, `None` if the host is unknown.
    pub fn host_header(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        Some(match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        })
    }
}

/// Handler applying forwarding headers to requests and removing them afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedHeadersHandler {
    defaults: ForwardedHeaderDefaults,
    remove_only: bool,
    path_helper: UrlPathHelper,
}

impl TryFrom<ForwardedHeadersConf> for ForwardedHeadersHandler {
    type Error = Error;

    fn try_from(conf: ForwardedHeadersConf) -> Result<Self, Self::Error> {
        debug!("Forwarded headers configuration received: {conf:#?}");

        Ok(Self {
            defaults: ForwardedHeaderDefaults::from(&conf),
            remove_only: conf.forwarded_remove_only,
            path_helper: UrlPathHelper::raw(),
        })
    }
}

impl ForwardedHeadersHandler {
    /// The configured header defaults
    pub fn defaults(&self) -> &ForwardedHeaderDefaults {
        &self.defaults
    }

    /// Determines the effective value of a forwarding header: the first request header value
    /// if present, the configured default otherwise. Blank values count as absent.
    fn header_value(
        &self,
        request: &impl RequestWrapper,
        header: ForwardedHeader,
    ) -> Option<String> {
        let value = match request.headers().get(header.header_name()) {
            Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            None => self.defaults.get(header)?.to_owned(),
        };

        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Determines how the request looked before it passed the proxies. Returns `None` if
    /// neither the request nor the defaults contain any forwarding information.
    pub fn resolve(
        &self,
        request: &impl RequestWrapper,
    ) -> Result<Option<ForwardedResolution>, Error> {
        let values = ForwardedHeader::ALL
            .into_iter()
            .filter_map(|header| Some((header, self.header_value(request, header)?)))
            .collect::<HashMap<_, _>>();
        if values.is_empty() {
            trace!("No forwarding information for {}", request.uri());
            return Ok(None);
        }
        trace!("Effective forwarding headers: {values:?}");

        let token = |header: ForwardedHeader| {
            first_value_token(values.get(&header).map(String::as_str), ',')
                .filter(|token| !token.is_empty())
                .map(ToOwned::to_owned)
        };

        let (proto, forwarded_host, forwarded_port, client) =
            if let Some(forwarded) = values.get(&ForwardedHeader::Forwarded) {
                let element = ForwardedElement::parse_first(forwarded);
                let client = element.client().map(ToOwned::to_owned);
                (element.proto, element.host, None, client)
            } else {
                let proto = token(ForwardedHeader::XForwardedProto)
                    .map(|proto| proto.to_ascii_lowercase())
                    .or_else(|| {
                        token(ForwardedHeader::XForwardedSsl)
                            .filter(|ssl| ssl.eq_ignore_ascii_case("on"))
                            .map(|_| "https".to_owned())
                    });
                let client =
                    token(ForwardedHeader::XForwardedFor).map(|node| node_name(&node).to_owned());
                (
                    proto,
                    token(ForwardedHeader::XForwardedHost),
                    token(ForwardedHeader::XForwardedPort),
                    client,
                )
            };

        let mut scheme = request.scheme().to_owned();
        let mut host = request.server_name().map(|host| host.into_owned());
        let mut port = request.server_port();

        if let Some(proto) = proto {
            scheme = proto;
            port = None;
        }

        let mut embedded_port = None;
        if let Some(forwarded_host) = forwarded_host {
            let (name, value) = split_host_port(&forwarded_host);
            match verify_uri_component(name, UriComponentType::for_host(name)) {
                Ok(()) => {
                    host = Some(name.to_owned());
                    embedded_port = value.and_then(parse_port);
                    port = embedded_port;
                }
                Err(err) => debug!("Ignoring forwarded host {forwarded_host}: {err}"),
            }
        }

        if embedded_port.is_none() {
            if let Some(forwarded_port) = forwarded_port.as_deref().and_then(parse_port) {
                port = Some(forwarded_port);
            }
        }

        let port = port.filter(|port| Some(*port) != default_port(&scheme));

        let prefix = values
            .get(&ForwardedHeader::XForwardedPrefix)
            .and_then(|prefix| normalize_prefix(prefix));
        let (context_path, path) = if let Some(prefix) = &prefix {
            let context_path = join_context_path(prefix, request.context_path());
            let path = format!(
                "{context_path}{}",
                self.path_helper.path_within_application(request)?
            );
            (context_path, path)
        } else {
            (
                request.context_path().to_owned(),
                request.request_path().to_owned(),
            )
        };

        // The path is kept as is, only the authority goes through the builder
        let mut uri = match &host {
            Some(host) => UriComponentsBuilder::new()
                .scheme(&scheme)
                .host(host)
                .port(port)
                .build()
                .to_uri_string(),
            None => String::new(),
        };
        uri.push_str(&path);
        if let Some(query) = request.query_string() {
            uri.push('?');
            uri.push_str(query);
        }
        let uri: Uri = uri
            .parse()
            .map_err(|source| Error::InvalidUri { uri, source })?;

        let resolution = ForwardedResolution {
            scheme,
            host,
            port,
            prefix,
            context_path,
            client,
            uri,
        };
        trace!("Resolved forwarding information: {resolution:?}");
        Ok(Some(resolution))
    }
}

impl RequestFilter for ForwardedHeadersHandler {
    type Conf = ForwardedHeadersConf;

    fn request_filter(
        &self,
        request: &mut impl RequestWrapper,
    ) -> Result<RequestFilterResult, Error> {
        if !self.remove_only {
            if let Some(resolution) = self.resolve(request)? {
                apply(request, resolution)?;
            }
        }

        remove_headers(request);
        Ok(RequestFilterResult::Unhandled)
    }
}

fn apply(
    request: &mut impl RequestWrapper,
    resolution: ForwardedResolution,
) -> Result<(), Error> {
    if let Some(host) = resolution.host_header() {
        let value = HeaderValue::try_from(host).map_err(|source| Error::InvalidHeader {
            name: header::HOST,
            source,
        })?;
        request.headers_mut().insert(header::HOST, value);
    }

    if resolution.prefix.is_some() {
        request.set_context_path(resolution.context_path);
    }

    if let Some(client) = resolution.client {
        request.set_client_addr(client);
    }

    request.set_uri(resolution.uri);
    Ok(())
}

/// Removes `Forwarded` and any `X-Forwarded-*` headers, including ones the handler doesn’t
/// interpret like `X-Forwarded-Server`.
fn remove_headers(request: &mut impl RequestWrapper) {
    let headers = request.headers_mut();
    let names = headers
        .keys()
        .filter(|name| {
            **name == header::FORWARDED || name.as_str().starts_with("x-forwarded-")
        })
        .cloned()
        .collect::<Vec<_>>();
    for name in names {
        headers.remove(&name);
        trace!("Removed {name} header");
    }
}

fn parse_port(value: &str) -> Option<u16> {
    match value.trim().parse() {
        Ok(port) => Some(port),
        Err(err) => {
            debug!("Ignoring forwarded port {value}: {err}");
            None
        }
    }
}

/// Removes trailing slashes and makes sure the prefix starts with a slash. Multiple
/// comma-separated prefixes are concatenated. Returns `None` if nothing remains.
fn normalize_prefix(value: &str) -> Option<String> {
    let mut prefix = String::new();
    for token in value.split(',') {
        let token = token.trim().trim_end_matches('/');
        if token.is_empty() {
            continue;
        }
        if !token.starts_with('/') {
            prefix.push('/');
        }
        prefix.push_str(token);
    }

    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

fn join_context_path(prefix: &str, context_path: &str) -> String {
    let context_path = context_path.trim_start_matches('/');
    if context_path.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}/{context_path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::Request;
    use test_log::test;
    use xff_module_utils::FromYaml;

    fn make_handler(conf: &str) -> ForwardedHeadersHandler {
        <ForwardedHeadersHandler as RequestFilter>::new(
            ForwardedHeadersConf::from_yaml(conf).unwrap(),
        )
        .unwrap()
    }

    fn make_request(uri: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::get(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    fn filter(handler: &ForwardedHeadersHandler, request: &mut Request<()>) {
        assert_eq!(
            handler.request_filter(request).unwrap(),
            RequestFilterResult::Unhandled
        );
    }

    fn host_header(request: &Request<()>) -> Option<&str> {
        request
            .headers()
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
    }

    #[test]
    fn defaults_apply() {
        let handler = make_handler(
            "forwarded_defaults:\n  X-Forwarded-Proto: https\n  X-Forwarded-Host: example.com",
        );
        assert_eq!(handler.defaults().len(), 2);

        let mut request = make_request("/path?x=1", &[("Host", "internal:8080")]);
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://example.com/path?x=1");
        assert_eq!(host_header(&request), Some("example.com"));
        assert_eq!(request.original_uri(), "/path?x=1");
    }

    #[test]
    fn headers_override_defaults() {
        let handler = make_handler(
            "forwarded_defaults:\n  X-Forwarded-Proto: https\n  X-Forwarded-Host: example.com",
        );

        let mut request = make_request(
            "/path",
            &[
                ("Host", "internal:8080"),
                ("X-Forwarded-Proto", "http"),
                ("X-Forwarded-Host", "example.net"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.net/path");

        // An empty header overrides the default but doesn't count as forwarding information
        let mut request = make_request(
            "/path",
            &[("Host", "internal:8080"), ("X-Forwarded-Host", "")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://internal/path");
        assert_eq!(host_header(&request), Some("internal"));
    }

    #[test]
    fn forwarded_header() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "internal:8080"),
                ("Forwarded", "for=1.2.3.4;proto=https;host=example.com"),
            ],
        );
        let resolution = handler.resolve(&request).unwrap().unwrap();
        assert_eq!(resolution.scheme, "https");
        assert_eq!(resolution.host.as_deref(), Some("example.com"));
        assert_eq!(resolution.port, None);
        assert_eq!(resolution.client.as_deref(), Some("1.2.3.4"));

        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://example.com/");
        assert_eq!(request.client_addr(), Some("1.2.3.4"));
    }

    #[test]
    fn forwarded_header_malformed_parameter() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "internal"),
                ("Forwarded", "for=\"bad;proto=https;host=example.com"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://example.com/");
        assert_eq!(request.client_addr(), None);
    }

    #[test]
    fn forwarded_header_takes_precedence() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "internal"),
                ("Forwarded", "proto=https;for=\"[2001:db8::1]:4711\", proto=http"),
                ("X-Forwarded-Host", "example.net"),
                ("X-Forwarded-Port", "8443"),
                ("X-Forwarded-For", "5.6.7.8"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://internal/");
        assert_eq!(request.client_addr(), Some("2001:db8::1"));
    }

    #[test]
    fn host_with_port() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[("Host", "internal"), ("X-Forwarded-Host", "example.com:8443")],
        );
        let resolution = handler.resolve(&request).unwrap().unwrap();
        assert_eq!(resolution.port, Some(8443));

        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com:8443/");
        assert_eq!(host_header(&request), Some("example.com:8443"));

        // Embedded port wins over X-Forwarded-Port
        let mut request = make_request(
            "/",
            &[
                ("Host", "internal"),
                ("X-Forwarded-Host", "example.com:8443, proxy.example.com"),
                ("X-Forwarded-Port", "9000"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com:8443/");

        let mut request = make_request(
            "/",
            &[("Host", "internal"), ("X-Forwarded-Host", "[::1]:8443")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://[::1]:8443/");
    }

    #[test]
    fn forwarded_port() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "internal:8080"),
                ("X-Forwarded-Host", "example.com"),
                ("X-Forwarded-Port", "8443"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com:8443/");

        let mut request = make_request(
            "/",
            &[("Host", "internal:8080"), ("X-Forwarded-Port", "9000")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://internal:9000/");

        // Host without port resets the port, invalid port is ignored
        let mut request = make_request(
            "/",
            &[
                ("Host", "internal:8080"),
                ("X-Forwarded-Host", "example.com"),
                ("X-Forwarded-Port", "invalid"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/");

        // Default port is omitted
        let mut request = make_request(
            "/",
            &[
                ("Host", "internal:8080"),
                ("X-Forwarded-Proto", "HTTPS"),
                ("X-Forwarded-Port", "443"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://internal/");
    }

    #[test]
    fn forwarded_ssl() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/path",
            &[("Host", "example.com:8080"), ("X-Forwarded-Ssl", "ON")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://example.com/path");

        let mut request = make_request(
            "/path",
            &[
                ("Host", "example.com"),
                ("X-Forwarded-Ssl", "on"),
                ("X-Forwarded-Proto", "http"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/path");

        let mut request = make_request(
            "/path",
            &[("Host", "example.com:8080"), ("X-Forwarded-Ssl", "off")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com:8080/path");
    }

    #[test]
    fn prefix() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/path/a%20b?x=%20",
            &[("Host", "example.com"), ("X-Forwarded-Prefix", "/app/")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/app/path/a%20b?x=%20");
        assert_eq!(request.context_path(), "/app");

        let mut request = make_request(
            "/ctx/path;jsessionid=123",
            &[("Host", "example.com"), ("X-Forwarded-Prefix", "app")],
        );
        request.set_context_path("/ctx".to_owned());
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/app/ctx/path");
        assert_eq!(request.context_path(), "/app/ctx");

        let mut request = make_request(
            "/path;jsessionid=123",
            &[("Host", "example.com"), ("X-Forwarded-Prefix", "///")],
        );
        request.set_context_path("/".to_owned());
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/path;jsessionid=123");
        assert_eq!(request.context_path(), "/");

        assert_eq!(normalize_prefix("/a/, b//"), Some("/a/b".to_owned()));
        assert_eq!(normalize_prefix(" / "), None);
    }

    #[test]
    fn path_kept_verbatim() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/a//b/%2F/c?q=a//b",
            &[("Host", "internal"), ("X-Forwarded-Proto", "https")],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://internal/a//b/%2F/c?q=a//b");
    }

    #[test]
    fn prefix_default() {
        let handler = make_handler("forwarded_defaults:\n  X-Forwarded-Prefix: /app");

        let mut request = make_request("/path", &[("Host", "example.com")]);
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "http://example.com/app/path");
    }

    #[test]
    fn forwarded_for() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "example.com"),
                ("X-Forwarded-For", " 192.0.2.1:1234 , 10.0.0.1"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.client_addr(), Some("192.0.2.1"));
        assert_eq!(request.uri(), "http://example.com/");
    }

    #[test]
    fn no_forwarding_information() {
        let handler = make_handler("{}");

        let mut request = make_request("/path?x", &[("Host", "example.com:8080")]);
        assert_eq!(handler.resolve(&request).unwrap(), None);
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "/path?x");
        assert_eq!(host_header(&request), Some("example.com:8080"));
        assert_eq!(request.client_addr(), None);

        // Without a host the URI stays relative
        let mut request = make_request("/path", &[("X-Forwarded-Proto", "https")]);
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "/path");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn headers_removed() {
        let handler = make_handler("{}");

        let mut request = make_request(
            "/",
            &[
                ("Host", "example.com"),
                ("Forwarded", "proto=https"),
                ("X-Forwarded-Host", "example.net"),
                ("X-Forwarded-Port", "8443"),
                ("X-Forwarded-Proto", "https"),
                ("X-Forwarded-Prefix", "/app"),
                ("X-Forwarded-Ssl", "on"),
                ("X-Forwarded-For", "1.2.3.4"),
                ("X-Forwarded-For", "5.6.7.8"),
                ("X-Forwarded-Server", "proxy.example.com"),
                ("X-Real-IP", "1.2.3.4"),
            ],
        );
        filter(&handler, &mut request);
        for header in ForwardedHeader::ALL {
            assert!(!request.headers().contains_key(header.header_name()));
        }
        assert!(!request.headers().contains_key("x-forwarded-server"));
        assert!(request.headers().contains_key("x-real-ip"));
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn remove_only() {
        let handler = make_handler(
            "forwarded_defaults:\n  X-Forwarded-Proto: https\nforwarded_remove_only: true",
        );

        let mut request = make_request(
            "/path",
            &[
                ("Host", "example.com"),
                ("X-Forwarded-Host", "example.net"),
                ("X-Forwarded-For", "1.2.3.4"),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "/path");
        assert_eq!(host_header(&request), Some("example.com"));
        assert_eq!(request.client_addr(), None);
        assert!(!request.headers().contains_key("x-forwarded-host"));
        assert!(!request.headers().contains_key("x-forwarded-for"));
    }

    #[test]
    fn invalid_forwarded_host() {
        let handler = make_handler("{}");

        for host in [
            "example.com/evil",
            "user@example.com",
            "example.com?x=1",
            "example.com#x",
            "[::1/x]:8443",
        ] {
            let mut request = make_request(
                "/app/data?x=1",
                &[("Host", "internal"), ("X-Forwarded-Host", host)],
            );
            filter(&handler, &mut request);
            assert_eq!(request.uri(), "http://internal/app/data?x=1", "{host}");
            assert_eq!(host_header(&request), Some("internal"));
        }

        let mut request = make_request(
            "/",
            &[
                ("Host", "internal"),
                ("Forwarded", "proto=https;host=\"example.com/evil\""),
            ],
        );
        filter(&handler, &mut request);
        assert_eq!(request.uri(), "https://internal/");
    }

    #[test]
    fn invalid_values() {
        let handler = make_handler("{}");

        let request = make_request(
            "/",
            &[("Host", "example.com"), ("X-Forwarded-Proto", "ht tp")],
        );
        assert!(matches!(
            handler.resolve(&request),
            Err(Error::InvalidUri { .. })
        ));
    }
}
