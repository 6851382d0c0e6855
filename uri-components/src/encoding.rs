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

//! Percent-encoding, decoding and verification of individual URI parts
//!
//! Each part of a URI has its own set of characters that may appear unescaped, see
//! [RFC 3986](https://datatracker.ietf.org/doc/html/rfc3986#section-2). A character legal in one
//! part is escaped in another if it would change the structure there, e.g. `/` is data within a
//! path segment but a delimiter within a full path.

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use crate::{Charset, UriError};

// unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// sub-delims = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="
const UNRESERVED_SUB_DELIMS: &AsciiSet = &UNRESERVED
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

// pchar = unreserved / pct-encoded / sub-delims / ":" / "@"
const PCHAR: &AsciiSet = &UNRESERVED_SUB_DELIMS.remove(b':').remove(b'@');

const SCHEME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'+').remove(b'-').remove(b'.');
const USER_INFO: &AsciiSet = &UNRESERVED_SUB_DELIMS.remove(b':');
const HOST_IPV6: &AsciiSet = &UNRESERVED_SUB_DELIMS
    .remove(b'[')
    .remove(b']')
    .remove(b':');
const PATH: &AsciiSet = &PCHAR.remove(b'/');
const QUERY: &AsciiSet = &PCHAR.remove(b'/').remove(b'?');
const QUERY_PARAM_NAME: &AsciiSet = &QUERY.add(b'=').add(b'&');
const QUERY_PARAM_VALUE: &AsciiSet = &QUERY.add(b'&');

/// The structural position a string occupies within a URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriComponentType {
    /// URI scheme like `https`
    Scheme,
    /// User information preceding the host
    UserInfo,
    /// Registered name or IPv4 address
    HostIpv4,
    /// Bracketed IPv6 address
    HostIpv6,
    /// Complete path, `/` is a delimiter here
    Path,
    /// Single path segment, `/` is data here
    PathSegment,
    /// Complete query string
    Query,
    /// Name of a query parameter
    QueryParamName,
    /// Value of a query parameter
    QueryParamValue,
    /// Fragment identifier
    Fragment,
    /// Arbitrary data embedded into a URI, only unreserved characters stay unescaped
    Uri,
}

impl UriComponentType {
    /// Selects the host type appropriate for the host value.
    pub fn for_host(host: &str) -> Self {
        if host.starts_with('[') {
            Self::HostIpv6
        } else {
            Self::HostIpv4
        }
    }

    fn encode_set(self) -> &'static AsciiSet {
        match self {
            Self::Scheme => SCHEME,
            Self::UserInfo => USER_INFO,
            Self::HostIpv4 => UNRESERVED_SUB_DELIMS,
            Self::HostIpv6 => HOST_IPV6,
            Self::Path => PATH,
            Self::PathSegment => PCHAR,
            Self::Query => QUERY,
            Self::QueryParamName => QUERY_PARAM_NAME,
            Self::QueryParamValue => QUERY_PARAM_VALUE,
            Self::Fragment => QUERY,
            Self::Uri => UNRESERVED,
        }
    }

    /// Checks whether an ASCII byte may appear unescaped in this part of the URI.
    pub fn is_allowed(self, byte: u8) -> bool {
        byte.is_ascii()
            && byte != b'%'
            && percent_encode(std::slice::from_ref(&byte), self.encode_set())
                .next()
                .is_some_and(|chunk| chunk.len() == 1)
    }
}

impl Display for UriComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Scheme => "scheme",
            Self::UserInfo => "user info",
            Self::HostIpv4 => "host",
            Self::HostIpv6 => "IPv6 host",
            Self::Path => "path",
            Self::PathSegment => "path segment",
            Self::Query => "query",
            Self::QueryParamName => "query parameter name",
            Self::QueryParamValue => "query parameter value",
            Self::Fragment => "fragment",
            Self::Uri => "URI",
        })
    }
}

/// Percent-encodes a string for the given part of a URI. Characters outside the allowed set are
/// converted to bytes with `charset` first.
///
/// Existing escape sequences aren’t recognized, a `%` character is always escaped.
pub fn encode_uri_component(
    source: &str,
    charset: Charset,
    component: UriComponentType,
) -> Cow<'_, str> {
    match charset.encode(source) {
        Cow::Borrowed(bytes) => percent_encode(bytes, component.encode_set()).into(),
        Cow::Owned(bytes) => percent_encode(&bytes, component.encode_set())
            .to_string()
            .into(),
    }
}

/// Percent-encodes everything but unreserved characters, suitable for embedding arbitrary data
/// such as template variable values.
pub fn encode(source: &str, charset: Charset) -> Cow<'_, str> {
    encode_uri_component(source, charset, UriComponentType::Uri)
}

/// Checks that an encoded string only contains characters allowed in this part of the URI and
/// well-formed escape sequences.
pub fn verify_uri_component(source: &str, component: UriComponentType) -> Result<(), UriError> {
    let bytes = source.as_bytes();
    let mut chars = source.char_indices();
    while let Some((index, c)) = chars.next() {
        if c == '%' {
            let valid = bytes
                .get(index + 1..index + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(UriError::InvalidEncodedSequence {
                    sequence: source[index..].chars().take(3).collect(),
                    value: source.to_owned(),
                });
            }

            // Both hex digits are ASCII, skip them
            chars.nth(1);
        } else if !u8::try_from(c).is_ok_and(|byte| component.is_allowed(byte)) {
            return Err(UriError::InvalidComponent {
                component,
                character: c,
                value: source.to_owned(),
            });
        }
    }
    Ok(())
}

/// Decodes percent-encoded text, interpreting the resulting bytes with `charset`.
///
/// `+` is not treated as an encoded space. Malformed escape sequences are kept as they are.
pub fn decode(source: &str, charset: Charset) -> Cow<'_, str> {
    match Cow::<'_, [u8]>::from(percent_decode_str(source)) {
        Cow::Borrowed(bytes) => charset.decode(bytes),
        Cow::Owned(bytes) => charset.decode(&bytes).into_owned().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn encode_components() {
        let encode = |s, c| encode_uri_component(s, Charset::Utf8, c).into_owned();

        assert_eq!(encode("http", UriComponentType::Scheme), "http");
        assert_eq!(encode("foo bar", UriComponentType::Scheme), "foo%20bar");
        assert_eq!(encode("user:p@ss", UriComponentType::UserInfo), "user:p%40ss");
        assert_eq!(encode("exa mple.com", UriComponentType::HostIpv4), "exa%20mple.com");
        assert_eq!(encode("[::1]", UriComponentType::HostIpv6), "[::1]");
        assert_eq!(encode("/a b/c", UriComponentType::Path), "/a%20b/c");
        assert_eq!(encode("a/b", UriComponentType::PathSegment), "a%2Fb");
        assert_eq!(encode("a;b=c", UriComponentType::PathSegment), "a;b=c");
        assert_eq!(encode("a=b&c?", UriComponentType::Query), "a=b&c?");
        assert_eq!(encode("a=b&c", UriComponentType::QueryParamName), "a%3Db%26c");
        assert_eq!(encode("a=b&c", UriComponentType::QueryParamValue), "a=b%26c");
        assert_eq!(encode("x y#", UriComponentType::Fragment), "x%20y%23");
        assert_eq!(encode("a/b:c", UriComponentType::Uri), "a%2Fb%3Ac");
        assert_eq!(encode("100%", UriComponentType::Path), "100%25");
        assert_eq!(encode("中文", UriComponentType::PathSegment), "%E4%B8%AD%E6%96%87");
    }

    #[test]
    fn encode_charset() {
        assert_eq!(
            encode_uri_component("äöü", Charset::Latin1, UriComponentType::PathSegment),
            "%E4%F6%FC"
        );
        assert_eq!(
            encode_uri_component("äöü", Charset::Utf8, UriComponentType::PathSegment),
            "%C3%A4%C3%B6%C3%BC"
        );
        assert!(matches!(
            encode_uri_component("plain", Charset::Utf8, UriComponentType::Path),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn verify() {
        assert_eq!(verify_uri_component("/a%20b/c", UriComponentType::Path), Ok(()));
        assert_eq!(
            verify_uri_component("a/b", UriComponentType::PathSegment),
            Err(UriError::InvalidComponent {
                component: UriComponentType::PathSegment,
                character: '/',
                value: "a/b".to_owned(),
            })
        );
        assert_eq!(
            verify_uri_component("ä", UriComponentType::Path),
            Err(UriError::InvalidComponent {
                component: UriComponentType::Path,
                character: 'ä',
                value: "ä".to_owned(),
            })
        );
        assert_eq!(
            verify_uri_component("a%2", UriComponentType::Path),
            Err(UriError::InvalidEncodedSequence {
                sequence: "%2".to_owned(),
                value: "a%2".to_owned(),
            })
        );
        assert_eq!(
            verify_uri_component("a%zzb", UriComponentType::Path),
            Err(UriError::InvalidEncodedSequence {
                sequence: "%zz".to_owned(),
                value: "a%zzb".to_owned(),
            })
        );
        assert_eq!(verify_uri_component("a%2Fb", UriComponentType::PathSegment), Ok(()));
    }

    #[test]
    fn decode_round_trip() {
        for segment in ["plain", "with space", "a/b;c=d", "äöü", "中文", "100%", "a+b"] {
            for charset in [Charset::Utf8, Charset::Latin1] {
                if charset == Charset::Latin1 && segment == "中文" {
                    continue;
                }
                let encoded =
                    encode_uri_component(segment, charset, UriComponentType::PathSegment);
                assert_eq!(decode(&encoded, charset), segment);
            }
        }
    }

    #[test]
    fn decode_lenient() {
        assert_eq!(decode("/foo%20bar", Charset::Utf8), "/foo bar");
        assert_eq!(decode("/foo+bar", Charset::Utf8), "/foo+bar");
        assert_eq!(decode("/foo%zz", Charset::Utf8), "/foo%zz");
        assert_eq!(decode("%C3%A4", Charset::Latin1), "Ã¤");
    }
}
