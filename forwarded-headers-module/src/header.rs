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

//! Names of the headers carrying forwarding information

use http::HeaderName;
use std::fmt::{Display, Formatter};

/// A header set by proxies to pass on information about the original request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForwardedHeader {
    /// `Forwarded` as defined in RFC 7239
    Forwarded,
    /// `X-Forwarded-Host`
    XForwardedHost,
    /// `X-Forwarded-Port`
    XForwardedPort,
    /// `X-Forwarded-Proto`
    XForwardedProto,
    /// `X-Forwarded-Prefix`
    XForwardedPrefix,
    /// `X-Forwarded-Ssl`
    XForwardedSsl,
    /// `X-Forwarded-For`
    XForwardedFor,
}

impl ForwardedHeader {
    /// All forwarding headers
    pub const ALL: [Self; 7] = [
        Self::Forwarded,
        Self::XForwardedHost,
        Self::XForwardedPort,
        Self::XForwardedProto,
        Self::XForwardedPrefix,
        Self::XForwardedSsl,
        Self::XForwardedFor,
    ];

    /// Canonical header name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Forwarded => "Forwarded",
            Self::XForwardedHost => "X-Forwarded-Host",
            Self::XForwardedPort => "X-Forwarded-Port",
            Self::XForwardedProto => "X-Forwarded-Proto",
            Self::XForwardedPrefix => "X-Forwarded-Prefix",
            Self::XForwardedSsl => "X-Forwarded-Ssl",
            Self::XForwardedFor => "X-Forwarded-For",
        }
    }

    /// Header name to look up the header in a request
    pub fn header_name(&self) -> HeaderName {
        HeaderName::from_static(match self {
            Self::Forwarded => "forwarded",
            Self::XForwardedHost => "x-forwarded-host",
            Self::XForwardedPort => "x-forwarded-port",
            Self::XForwardedProto => "x-forwarded-proto",
            Self::XForwardedPrefix => "x-forwarded-prefix",
            Self::XForwardedSsl => "x-forwarded-ssl",
            Self::XForwardedFor => "x-forwarded-for",
        })
    }

    /// Looks up a forwarding header by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|header| header.name().eq_ignore_ascii_case(name))
    }

    /// Checks whether the name is the name of a forwarding header.
    pub fn is_forwarded_header(name: &str) -> bool {
        Self::from_name(name).is_some()
    }
}

impl Display for ForwardedHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn names() {
        assert_eq!(
            ForwardedHeader::from_name("x-forwarded-PROTO"),
            Some(ForwardedHeader::XForwardedProto)
        );
        assert_eq!(
            ForwardedHeader::from_name("Forwarded"),
            Some(ForwardedHeader::Forwarded)
        );
        assert_eq!(ForwardedHeader::from_name("X-Real-IP"), None);
        assert!(ForwardedHeader::is_forwarded_header("X-Forwarded-Ssl"));
        assert!(!ForwardedHeader::is_forwarded_header("Host"));

        for header in ForwardedHeader::ALL {
            assert_eq!(header.header_name().as_str(), header.name().to_ascii_lowercase());
            assert_eq!(header.to_string(), header.name());
        }
    }
}
