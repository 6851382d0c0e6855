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

//! Resolution of request paths relative to the application

use clap::Parser;
use log::{trace, warn};
use serde::Deserialize;
use std::borrow::Cow;
use uri_components::{decode, Charset};

use crate::{Error, RequestWrapper};

const JSESSIONID_KEY: &str = ";jsessionid=";

/// Command line options of the URL path helper
#[derive(Debug, Default, Parser)]
pub struct UrlPathOpt {
    /// Keep path parameters like `;a=b` in request paths (`;jsessionid=` is always removed).
    #[clap(long)]
    pub keep_semicolon_content: bool,

    /// Do not decode request paths.
    #[clap(long)]
    pub no_url_decode: bool,

    /// Character encoding used to decode request paths unless the request declares one.
    #[clap(long)]
    pub default_encoding: Option<String>,

    /// Always resolve paths relative to the application rather than the handler.
    #[clap(long)]
    pub always_use_full_path: bool,
}

/// Settings of the URL path helper
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UrlPathSettings {
    /// Remove path parameters (`;` up to the next `/`) from request paths.
    pub remove_semicolon_content: bool,

    /// Decode request paths.
    pub url_decode: bool,

    /// Character encoding to decode with unless the request declares one.
    pub default_encoding: String,

    /// Always resolve paths relative to the application rather than the handler.
    pub always_use_full_path: bool,
}

impl Default for UrlPathSettings {
    fn default() -> Self {
        Self {
            remove_semicolon_content: true,
            url_decode: true,
            default_encoding: Charset::Latin1.name().to_owned(),
            always_use_full_path: false,
        }
    }
}

/// Configuration file settings of the URL path helper
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UrlPathConf {
    /// URL path helper settings
    pub url_path: UrlPathSettings,
}

impl UrlPathConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: UrlPathOpt) {
        if opt.keep_semicolon_content {
            self.url_path.remove_semicolon_content = false;
        }

        if opt.no_url_decode {
            self.url_path.url_decode = false;
        }

        if let Some(default_encoding) = opt.default_encoding {
            self.url_path.default_encoding = default_encoding;
        }

        if opt.always_use_full_path {
            self.url_path.always_use_full_path = true;
        }
    }
}

/// Determines the path of a request within the application and the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPathHelper {
    settings: UrlPathSettings,
}

impl Default for UrlPathHelper {
    fn default() -> Self {
        Self::new(UrlPathSettings::default())
    }
}

impl From<UrlPathConf> for UrlPathHelper {
    fn from(conf: UrlPathConf) -> Self {
        Self::new(conf.url_path)
    }
}

impl UrlPathHelper {
    /// Creates a helper with the given settings.
    pub fn new(settings: UrlPathSettings) -> Self {
        Self { settings }
    }

    /// Creates a helper that leaves encoding and path parameters alone, apart from removing
    /// `jsessionid` parameters.
    pub fn raw() -> Self {
        Self::new(UrlPathSettings {
            remove_semicolon_content: false,
            url_decode: false,
            ..Default::default()
        })
    }

    /// The settings of this helper
    pub fn settings(&self) -> &UrlPathSettings {
        &self.settings
    }

    /// Returns the lookup path: the path within the application if configured so, otherwise the
    /// path within the handler mapping unless it is empty.
    pub fn lookup_path_for_request(&self, request: &impl RequestWrapper) -> Result<String, Error> {
        let path_within_app = self.path_within_application(request)?;
        if self.settings.always_use_full_path {
            return Ok(path_within_app);
        }

        let rest = self.path_within_servlet_mapping(request)?;
        if rest.is_empty() {
            Ok(path_within_app)
        } else {
            Ok(rest)
        }
    }

    /// Returns the path within the handler mapping, e.g. `/index.html` for handler path
    /// `/files` and path within application `/files/index.html`. If the handler path doesn’t
    /// match, the handler path is returned.
    pub fn path_within_servlet_mapping(
        &self,
        request: &impl RequestWrapper,
    ) -> Result<String, Error> {
        let path_within_app = self.path_within_application(request)?;
        let servlet_path = request.servlet_path();
        let sanitized = sanitize_path(&path_within_app);

        let path = if servlet_path.contains(&*sanitized) {
            remaining_path(&sanitized, servlet_path, false)
        } else {
            remaining_path(&path_within_app, servlet_path, false)
        };

        Ok(path.unwrap_or(servlet_path).to_owned())
    }

    /// Returns the request path with the context path removed. An empty remainder becomes `/`.
    /// If the context path doesn’t match, the complete request path is returned.
    pub fn path_within_application(&self, request: &impl RequestWrapper) -> Result<String, Error> {
        let context_path = self.context_path(request)?;
        let request_uri = self.request_uri(request)?;
        let path = match remaining_path(&request_uri, &context_path, true) {
            Some("") => "/".to_owned(),
            Some(path) => path.to_owned(),
            None => request_uri,
        };
        trace!("path within application for {}: {path}", request.request_path());
        Ok(path)
    }

    /// Returns the request path with path parameters handled, decoded and with duplicate
    /// slashes removed.
    pub fn request_uri(&self, request: &impl RequestWrapper) -> Result<String, Error> {
        let uri = self.remove_semicolon_content(request.request_path());
        let uri = self.decode_request_string(request, &uri)?;
        Ok(sanitize_path(&uri).into_owned())
    }

    /// Returns the decoded context path, `/` is considered the same as no context path.
    pub fn context_path(&self, request: &impl RequestWrapper) -> Result<String, Error> {
        let context_path = request.context_path();
        if context_path == "/" {
            return Ok(String::new());
        }
        Ok(self.decode_request_string(request, context_path)?.into_owned())
    }

    /// Decodes the value using the request encoding or the default encoding if the request
    /// doesn’t declare one. An unsupported request encoding causes a fallback to the default
    /// encoding.
    pub fn decode_request_string<'a>(
        &self,
        request: &impl RequestWrapper,
        source: &'a str,
    ) -> Result<Cow<'a, str>, Error> {
        if !self.settings.url_decode {
            return Ok(source.into());
        }

        let charset = match request.character_encoding() {
            Some(encoding) => Charset::for_name(encoding).or_else(|err| {
                warn!(
                    "Could not decode request string [{source}] with encoding '{encoding}', \
                     falling back to '{}': {err}",
                    self.settings.default_encoding
                );
                self.default_charset()
            })?,
            None => self.default_charset()?,
        };
        Ok(decode(source, charset))
    }

    fn default_charset(&self) -> Result<Charset, Error> {
        Charset::for_name(&self.settings.default_encoding)
            .map_err(|_| Error::UnsupportedEncoding(self.settings.default_encoding.clone()))
    }

    /// Removes path parameters if configured so, otherwise only `jsessionid` parameters.
    pub fn remove_semicolon_content<'a>(&self, uri: &'a str) -> Cow<'a, str> {
        if self.settings.remove_semicolon_content {
            remove_all_semicolon_content(uri)
        } else {
            remove_jsessionid(uri)
        }
    }
}

/// Removes everything from each `;` up to the next `/`.
fn remove_all_semicolon_content(uri: &str) -> Cow<'_, str> {
    if !uri.contains(';') {
        return uri.into();
    }

    let mut result = String::with_capacity(uri.len());
    let mut rest = uri;
    while let Some(start) = rest.find(';') {
        result.push_str(&rest[..start]);
        rest = match rest[start..].find('/') {
            Some(end) => &rest[start + end..],
            None => "",
        };
    }
    result.push_str(rest);
    result.into()
}

/// Removes all `;jsessionid=` parameters, the name is matched case-insensitively. Each
/// parameter ends at the next `;` or `/`.
fn remove_jsessionid(uri: &str) -> Cow<'_, str> {
    let find_key = |s: &str| {
        s.as_bytes()
            .windows(JSESSIONID_KEY.len())
            .position(|window| window.eq_ignore_ascii_case(JSESSIONID_KEY.as_bytes()))
    };

    if find_key(uri).is_none() {
        return uri.into();
    }

    let mut result = String::with_capacity(uri.len());
    let mut rest = uri;
    while let Some(start) = find_key(rest) {
        result.push_str(&rest[..start]);
        let value_start = start + JSESSIONID_KEY.len();
        rest = match rest[value_start..].find([';', '/']) {
            Some(end) => &rest[value_start + end..],
            None => "",
        };
    }
    result.push_str(rest);
    result.into()
}

/// Collapses duplicate slashes.
fn sanitize_path(path: &str) -> Cow<'_, str> {
    if !path.contains("//") {
        return path.into();
    }

    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c != '/' || !result.ends_with('/') {
            result.push(c);
        }
    }
    result.into()
}

/// Matches `mapping` at the start of `request_uri` and returns the remainder. Path parameters
/// in the request URI are skipped while matching.
fn remaining_path<'a>(request_uri: &'a str, mapping: &str, ignore_case: bool) -> Option<&'a str> {
    let uri = request_uri.as_bytes();
    let mapping = mapping.as_bytes();

    let mut index1 = 0;
    let mut index2 = 0;
    while index1 < uri.len() && index2 < mapping.len() {
        let mut c1 = uri[index1];
        let c2 = mapping[index2];
        if c1 == b';' {
            index1 += request_uri[index1..].find('/')?;
            c1 = uri[index1];
        }
        if c1 != c2 && !(ignore_case && c1.eq_ignore_ascii_case(&c2)) {
            return None;
        }
        index1 += 1;
        index2 += 1;
    }

    if index2 != mapping.len() {
        return None;
    }
    if index1 == uri.len() {
        return Some("");
    }
    if uri[index1] == b';' {
        return Some(
            request_uri[index1..]
                .find('/')
                .map_or("", |end| &request_uri[index1 + end..]),
        );
    }
    Some(&request_uri[index1..])
}
