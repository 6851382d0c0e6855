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

//! Abstraction over HTTP requests being processed

use http::request::Parts;
use http::{header, Extensions, HeaderMap, Method, Request, Uri};
use std::borrow::Cow;

/// Splits a `Host`-style value into host name and port. IPv6 addresses keep their brackets.
/// The port is returned as is, it might not be numeric.
///
/// ```rust
/// use xff_module_utils::split_host_port;
///
/// assert_eq!(split_host_port("example.com:8080"), ("example.com", Some("8080")));
/// assert_eq!(split_host_port("[::1]:443"), ("[::1]", Some("443")));
/// assert_eq!(split_host_port("[::1]"), ("[::1]", None));
/// ```
pub fn split_host_port(value: &str) -> (&str, Option<&str>) {
    let port_separator = if value.starts_with('[') {
        value
            .find(']')
            .and_then(|end| value[end..].find(':').map(|index| end + index))
    } else {
        value.rfind(':')
    };

    match port_separator {
        Some(index) => (&value[..index], Some(&value[index + 1..])),
        None => (value, None),
    }
}

/// Default port for the scheme, only known for `http` and `https`.
pub fn default_port(scheme: &str) -> Option<u16> {
    if scheme.eq_ignore_ascii_case("http") {
        Some(80)
    } else if scheme.eq_ignore_ascii_case("https") {
        Some(443)
    } else {
        None
    }
}

/// Type used to store the context path in `RequestWrapper::extensions`
#[derive(Debug, Clone)]
struct ContextPath(String);

/// Type used to store the servlet path in `RequestWrapper::extensions`
#[derive(Debug, Clone)]
struct ServletPath(String);

/// Type used to store the declared request encoding in `RequestWrapper::extensions`
#[derive(Debug, Clone)]
struct CharacterEncoding(String);

/// Type used to store an explicit content length in `RequestWrapper::extensions`
#[derive(Debug, Clone, Copy)]
struct ContentLength(u64);

/// Type used to store the client address in `RequestWrapper::extensions`
#[derive(Debug, Clone)]
struct ClientAddr(String);

/// Type used to store original request URI in `RequestWrapper::extensions`
#[derive(Debug, Clone)]
struct OriginalUri(Uri);

/// A trait implemented by HTTP requests that request filters can process
///
/// Implementations exist for [`http::Request`] and [`http::request::Parts`]. Data that isn’t
/// part of the HTTP request itself, e.g. the context path, is kept in the request extensions.
pub trait RequestWrapper {
    /// Returns the request method.
    fn method(&self) -> &Method;

    /// Returns the request URI.
    ///
    /// This might not be the original request URI but one manipulated by a request filter.
    fn uri(&self) -> &Uri;

    /// Replaces the request URI without saving the original one.
    fn replace_uri(&mut self, uri: Uri);

    /// Returns a reference to the request headers.
    fn headers(&self) -> &HeaderMap;

    /// Returns a mutable reference to the request headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Returns a reference to the associated extensions.
    fn extensions(&self) -> &Extensions;

    /// Returns a mutable reference to the associated extensions.
    fn extensions_mut(&mut self) -> &mut Extensions;

    /// Returns the request scheme, `http` unless the request URI is absolute.
    fn scheme(&self) -> &str {
        self.uri().scheme_str().unwrap_or("http")
    }

    /// Determines the host the request was sent to, from the `Host` header if present and the
    /// request URI otherwise. The port isn’t included.
    fn server_name(&self) -> Option<Cow<'_, str>> {
        if let Some(host) = self
            .headers()
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .filter(|host| !host.is_empty())
        {
            return Some(split_host_port(host).0.into());
        }

        self.uri().host().map(Cow::from)
    }

    /// Determines the port the request was sent to. Unless the `Host` header or the request URI
    /// specify a port, this is the default port for the scheme.
    fn server_port(&self) -> Option<u16> {
        let host_header = self
            .headers()
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .filter(|host| !host.is_empty());

        let port = match host_header {
            Some(host) => split_host_port(host).1.and_then(|port| port.parse().ok()),
            None => self.uri().port_u16(),
        };
        port.or_else(|| default_port(self.scheme()))
    }

    /// Returns the request path, undecoded. This includes the context path.
    fn request_path(&self) -> &str {
        self.uri().path()
    }

    /// Returns the query string, undecoded.
    fn query_string(&self) -> Option<&str> {
        self.uri().query()
    }

    /// Returns the path prefix the application is mounted under, empty by default.
    fn context_path(&self) -> &str {
        if let Some(ContextPath(path)) = self.extensions().get() {
            path
        } else {
            ""
        }
    }

    /// Sets the path prefix the application is mounted under.
    fn set_context_path(&mut self, path: String) {
        self.extensions_mut().insert(ContextPath(path));
    }

    /// Returns the path prefix of the handler within the application, empty by default.
    fn servlet_path(&self) -> &str {
        if let Some(ServletPath(path)) = self.extensions().get() {
            path
        } else {
            ""
        }
    }

    /// Sets the path prefix of the handler within the application.
    fn set_servlet_path(&mut self, path: String) {
        self.extensions_mut().insert(ServletPath(path));
    }

    /// Returns the declared character encoding of the request if any.
    fn character_encoding(&self) -> Option<&str> {
        if let Some(CharacterEncoding(encoding)) = self.extensions().get() {
            Some(encoding.as_str()).filter(|encoding| !encoding.is_empty())
        } else {
            None
        }
    }

    /// Sets the declared character encoding, `None` removes it.
    fn set_character_encoding(&mut self, encoding: Option<String>) {
        if let Some(encoding) = encoding {
            self.extensions_mut().insert(CharacterEncoding(encoding));
        } else {
            self.extensions_mut().remove::<CharacterEncoding>();
        }
    }

    /// Returns the length of the request body if known, either set explicitly or taken from the
    /// `Content-Length` header.
    fn content_length(&self) -> Option<u64> {
        if let Some(ContentLength(length)) = self.extensions().get() {
            return Some(*length);
        }

        self.headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|length| length.to_str().ok())
            .and_then(|length| length.trim().parse().ok())
    }

    /// Sets the length of the request body.
    fn set_content_length(&mut self, length: u64) {
        self.extensions_mut().insert(ContentLength(length));
    }

    /// Returns the address of the client if known.
    fn client_addr(&self) -> Option<&str> {
        if let Some(ClientAddr(addr)) = self.extensions().get() {
            Some(addr.as_str())
        } else {
            None
        }
    }

    /// Overwrites the client address for this request.
    fn set_client_addr(&mut self, addr: String) {
        self.extensions_mut().insert(ClientAddr(addr));
    }

    /// Changes the request URI and saves the original URI.
    ///
    /// This method should be used instead of [`RequestWrapper::replace_uri`] unless the
    /// original URI is irrelevant.
    fn set_uri(&mut self, uri: Uri) {
        let current_uri = OriginalUri(self.uri().clone());
        if self.extensions().get::<OriginalUri>().is_none() {
            self.extensions_mut().insert(current_uri);
        }
        self.replace_uri(uri);
    }

    /// Returns the original URI of the request which might have been modified by a request
    /// filter afterwards.
    fn original_uri(&self) -> &Uri {
        if let Some(OriginalUri(uri)) = self.extensions().get() {
            uri
        } else {
            self.uri()
        }
    }
}

impl<B> RequestWrapper for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn uri(&self) -> &Uri {
        Request::uri(self)
    }

    fn replace_uri(&mut self, uri: Uri) {
        *self.uri_mut() = uri;
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        Request::extensions_mut(self)
    }
}

impl RequestWrapper for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn replace_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn make_request(uri: &str, host: Option<&str>) -> Request<()> {
        let mut builder = Request::get(uri);
        if let Some(host) = host {
            builder = builder.header(header::HOST, host);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn host_port_split() {
        assert_eq!(split_host_port("example.com"), ("example.com", None));
        assert_eq!(split_host_port("example.com:"), ("example.com", Some("")));
        assert_eq!(split_host_port("[::1]:8080"), ("[::1]", Some("8080")));
        assert_eq!(split_host_port("[::1]"), ("[::1]", None));
        assert_eq!(split_host_port("[::1"), ("[::1", None));
    }

    #[test]
    fn server_name_and_port() {
        let request = make_request("/", Some("example.com:8080"));
        assert_eq!(RequestWrapper::scheme(&request), "http");
        assert_eq!(request.server_name().as_deref(), Some("example.com"));
        assert_eq!(request.server_port(), Some(8080));

        let request = make_request("https://example.net/path", None);
        assert_eq!(RequestWrapper::scheme(&request), "https");
        assert_eq!(request.server_name().as_deref(), Some("example.net"));
        assert_eq!(request.server_port(), Some(443));

        let request = make_request("https://example.net:8443/path", Some("[::1]"));
        assert_eq!(request.server_name().as_deref(), Some("[::1]"));
        assert_eq!(request.server_port(), Some(443));

        let request = make_request("/", None);
        assert_eq!(request.server_name(), None);
        assert_eq!(request.server_port(), Some(80));
    }

    #[test]
    fn extension_values() {
        let mut request = make_request("/app/path?x=1", None);
        assert_eq!(request.request_path(), "/app/path");
        assert_eq!(request.query_string(), Some("x=1"));
        assert_eq!(request.context_path(), "");
        assert_eq!(request.servlet_path(), "");
        assert_eq!(request.character_encoding(), None);
        assert_eq!(request.content_length(), None);
        assert_eq!(request.client_addr(), None);

        request.set_context_path("/app".to_owned());
        request.set_servlet_path("/path".to_owned());
        request.set_character_encoding(Some("UTF-8".to_owned()));
        request.set_content_length(12);
        request.set_client_addr("192.0.2.1".to_owned());
        assert_eq!(request.context_path(), "/app");
        assert_eq!(request.servlet_path(), "/path");
        assert_eq!(request.character_encoding(), Some("UTF-8"));
        assert_eq!(request.content_length(), Some(12));
        assert_eq!(request.client_addr(), Some("192.0.2.1"));

        request.set_character_encoding(Some(String::new()));
        assert_eq!(request.character_encoding(), None);
        request.set_character_encoding(None);
        assert_eq!(request.character_encoding(), None);
    }

    #[test]
    fn content_length_header() {
        let (mut parts, _) = Request::post("/")
            .header(header::CONTENT_LENGTH, "42")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(parts.content_length(), Some(42));
        parts.set_content_length(7);
        assert_eq!(parts.content_length(), Some(7));
    }

    #[test]
    fn original_uri() {
        let (mut parts, _) = make_request("/first", None).into_parts();
        assert_eq!(parts.original_uri(), "/first");

        parts.set_uri(Uri::from_static("/second"));
        parts.set_uri(Uri::from_static("/third"));
        assert_eq!(RequestWrapper::uri(&parts), "/third");
        assert_eq!(parts.original_uri(), "/first");

        parts.replace_uri(Uri::from_static("/fourth"));
        assert_eq!(parts.original_uri(), "/first");
        assert_eq!(RequestWrapper::method(&parts), Method::GET);
    }
}
