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

//! Ordered header container

use http::{header, HeaderMap, HeaderName, HeaderValue};
use std::fmt::{Display, Formatter};
use uri_components::LinkedMultiValueMap;

use crate::Error;

/// HTTP headers in the order they were received. Header names are case-insensitive, values are
/// kept as strings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HttpHeaders {
    headers: LinkedMultiValueMap<HeaderName, String>,
}

impl HttpHeaders {
    /// Creates an empty header container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value, keeping existing values.
    pub fn add(&mut self, name: HeaderName, value: impl Into<String>) {
        self.headers.add(name, value.into());
    }

    /// Replaces all values of a header by a single value.
    pub fn set(&mut self, name: HeaderName, value: impl Into<String>) {
        self.headers.set(name, value.into());
    }

    /// Returns all values of a header.
    pub fn get(&self, name: &HeaderName) -> Option<&[String]> {
        self.headers.get(name)
    }

    /// Returns the first value of a header.
    pub fn get_first(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get_first(name).map(String::as_str)
    }

    /// Checks whether the header is present.
    pub fn contains(&self, name: &HeaderName) -> bool {
        self.headers.contains_key(name)
    }

    /// Removes a header, returning its values.
    pub fn remove(&mut self, name: &HeaderName) -> Option<Vec<String>> {
        self.headers.remove(name)
    }

    /// Iterates over header names and their values in order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[String])> + '_ {
        self.headers.iter()
    }

    /// Number of distinct headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Checks whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// The value of the `Content-Length` header if present and valid
    pub fn content_length(&self) -> Option<u64> {
        self.get_first(&header::CONTENT_LENGTH)
            .and_then(|length| length.trim().parse().ok())
    }

    /// Sets the `Content-Length` header.
    pub fn set_content_length(&mut self, length: u64) {
        self.set(header::CONTENT_LENGTH, length.to_string());
    }

    /// Converts into an [`http::HeaderMap`].
    pub fn to_header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, values) in self.iter() {
            for value in values {
                let value =
                    HeaderValue::from_str(value).map_err(|source| Error::InvalidHeader {
                        name: name.clone(),
                        source,
                    })?;
                map.append(name.clone(), value);
            }
        }
        Ok(map)
    }
}

impl From<&HeaderMap> for HttpHeaders {
    /// Copies all headers. Values that aren’t valid UTF-8 are converted lossily.
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.add(name.clone(), String::from_utf8_lossy(value.as_bytes()));
        }
        headers
    }
}

impl Display for HttpHeaders {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, values) in self.iter() {
            for value in values {
                writeln!(f, "{name}: {value}")?;
            }
        }
        Ok(())
    }
}
