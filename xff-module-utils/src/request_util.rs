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

//! Helpers extracting information from requests

use http::{header, Uri};
use log::trace;

use crate::{default_port, Error, HttpHeaders, RequestWrapper};

/// Reconstructs the absolute request URI from scheme, server name, server port, request path
/// and query string. The port is omitted if it is the default port for the scheme.
pub fn get_uri(request: &impl RequestWrapper) -> Result<Uri, Error> {
    let scheme = request.scheme();
    let mut uri = String::new();
    uri.push_str(scheme);
    uri.push_str("://");
    if let Some(server_name) = request.server_name() {
        uri.push_str(&server_name);
    }
    if let Some(port) = request
        .server_port()
        .filter(|port| Some(*port) != default_port(scheme))
    {
        uri.push(':');
        uri.push_str(&port.to_string());
    }
    uri.push_str(request.request_path());
    if let Some(query) = request.query_string().filter(|q| !q.trim().is_empty()) {
        uri.push('?');
        uri.push_str(query);
    }

    trace!("reconstructed request URI: {uri}");
    uri.parse()
        .map_err(|source| Error::InvalidUri { uri, source })
}

/// Copies the request headers in the order they were received. If there is no
/// `Content-Length` header but the content length is known, it is added.
pub fn get_headers(request: &impl RequestWrapper) -> HttpHeaders {
    let mut headers = HttpHeaders::from(request.headers());
    if !headers.contains(&header::CONTENT_LENGTH) {
        if let Some(length) = request.content_length() {
            headers.set_content_length(length);
        }
    }
    headers
}

/// Returns the first token of a delimited header value, trimmed.
///
/// ```rust
/// use xff_module_utils::request_util::first_value_token;
///
/// assert_eq!(first_value_token(Some("https, http"), ','), Some("https"));
/// assert_eq!(first_value_token(Some(" single "), ','), Some("single"));
/// assert_eq!(first_value_token(None, ','), None);
/// ```
pub fn first_value_token(value: Option<&str>, delimiter: char) -> Option<&str> {
    value.map(|value| value.split(delimiter).next().unwrap_or(value).trim())
}
