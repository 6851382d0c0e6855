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

//! Parser for the `Forwarded` header, see
//! [RFC 7239](https://datatracker.ietf.org/doc/html/rfc7239#section-4)

use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum MalformedForwardedToken {
    #[error("missing `=` in \"{0}\"")]
    MissingEquals(String),
    #[error("unbalanced quotes in \"{0}\"")]
    UnbalancedQuotes(String),
    #[error("empty parameter name in \"{0}\"")]
    EmptyName(String),
}

/// Parameters of a single `Forwarded` element, i.e. a single proxy hop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardedElement {
    /// The `proto` parameter, lower-cased
    pub proto: Option<String>,
    /// The `host` parameter, possibly including a port
    pub host: Option<String>,
    /// The `for` parameter identifying the client
    pub r#for: Option<String>,
    /// The `by` parameter identifying the proxy
    pub by: Option<String>,
}

impl ForwardedElement {
    /// Parses the first element of a `Forwarded` header value, which describes the request as
    /// received by the first proxy. Malformed parameters are skipped, for parameters occurring
    /// multiple times the first one is used.
    pub fn parse_first(value: &str) -> Self {
        let first = split_outside_quotes(value, ',')
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut element = Self::default();
        for pair in split_outside_quotes(first, ';') {
            let (name, value) = match parse_pair(pair) {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(err) => {
                    debug!("Skipping malformed Forwarded parameter: {err}");
                    continue;
                }
            };

            let target = match name.as_str() {
                "proto" => &mut element.proto,
                "host" => &mut element.host,
                "for" => &mut element.r#for,
                "by" => &mut element.by,
                _ => continue,
            };
            target.get_or_insert(value);
        }

        if let Some(proto) = &mut element.proto {
            proto.make_ascii_lowercase();
        }
        element
    }

    /// Returns the client node name from the `for` parameter, without brackets and port.
    pub fn client(&self) -> Option<&str> {
        self.r#for.as_deref().map(node_name)
    }
}

/// Splits the value at `delimiter` characters that aren’t within a quoted string. A quote that is
/// never closed is taken literally, so it only spoils the token containing it.
fn split_outside_quotes(value: &str, delimiter: char) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut open_quote = None;
    let mut escaped = false;
    let mut index = 0;
    while let Some(c) = value[index..].chars().next() {
        let next = index + c.len_utf8();
        if escaped {
            escaped = false;
        } else if open_quote.is_some() && c == '\\' {
            escaped = true;
        } else if c == '"' {
            open_quote = match open_quote {
                Some(_) => None,
                None => Some(next),
            };
        } else if open_quote.is_none() && c == delimiter {
            result.push(&value[start..index]);
            start = next;
        }
        index = next;

        if index == value.len() {
            if let Some(after_quote) = open_quote.take() {
                escaped = false;
                index = after_quote;
            }
        }
    }
    result.push(&value[start..]);
    result
}

fn parse_pair(pair: &str) -> Result<Option<(String, String)>, MalformedForwardedToken> {
    let pair = pair.trim();
    if pair.is_empty() {
        return Ok(None);
    }

    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| MalformedForwardedToken::MissingEquals(pair.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(MalformedForwardedToken::EmptyName(pair.to_owned()));
    }

    Ok(Some((name.to_ascii_lowercase(), unquote(value.trim())?)))
}

fn unquote(value: &str) -> Result<String, MalformedForwardedToken> {
    let unbalanced = || MalformedForwardedToken::UnbalancedQuotes(value.to_owned());

    let Some(quoted) = value.strip_prefix('"') else {
        return if value.contains('"') {
            Err(unbalanced())
        } else {
            Ok(value.to_owned())
        };
    };

    let mut result = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => result.push(chars.next().ok_or_else(unbalanced)?),
            '"' => {
                return if chars.as_str().is_empty() {
                    Ok(result)
                } else {
                    Err(unbalanced())
                };
            }
            c => result.push(c),
        }
    }
    Err(unbalanced())
}

/// Reduces a node identifier like `"[2001:db8::1]:4711"` or `192.0.2.1:8080` to the address.
pub(crate) fn node_name(node: &str) -> &str {
    if let Some(bracketed) = node.strip_prefix('[') {
        return bracketed
            .split_once(']')
            .map_or(node, |(address, _)| address);
    }

    match node.split_once(':') {
        Some((address, port)) if !port.contains(':') => address,
        _ => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn first_element() {
        let element = ForwardedElement::parse_first("for=1.2.3.4;proto=https;host=example.com");
        assert_eq!(element.proto.as_deref(), Some("https"));
        assert_eq!(element.host.as_deref(), Some("example.com"));
        assert_eq!(element.r#for.as_deref(), Some("1.2.3.4"));
        assert_eq!(element.by, None);

        let element = ForwardedElement::parse_first(
            "For=\"[2001:db8:cafe::17]:4711\";Proto=HTTP, for=192.0.2.43;proto=https",
        );
        assert_eq!(element.proto.as_deref(), Some("http"));
        assert_eq!(element.client(), Some("2001:db8:cafe::17"));
    }

    #[test]
    fn quoting() {
        let element = ForwardedElement::parse_first(r#"host="a;b,c";by="x\"y""#);
        assert_eq!(element.host.as_deref(), Some("a;b,c"));
        assert_eq!(element.by.as_deref(), Some("x\"y"));
    }

    #[test]
    fn malformed() {
        let element =
            ForwardedElement::parse_first("proto;=x;host=\"open;for=\"un\"balanced\";by=me");
        assert_eq!(element.proto, None);
        assert_eq!(element.host, None);
        assert_eq!(element.by.as_deref(), Some("me"));

        let element = ForwardedElement::parse_first("proto;=x;host=\"ok\";for=\"bad;by=me");
        assert_eq!(element.proto, None);
        assert_eq!(element.host.as_deref(), Some("ok"));
        assert_eq!(element.r#for, None);
        assert_eq!(element.by.as_deref(), Some("me"));

        // An unclosed quote only affects its own parameter
        let element = ForwardedElement::parse_first("for=\"bad;proto=https;host=example.com");
        assert_eq!(element.r#for, None);
        assert_eq!(element.proto.as_deref(), Some("https"));
        assert_eq!(element.host.as_deref(), Some("example.com"));

        let element = ForwardedElement::parse_first("for=\"a\\\";proto=https, proto=http");
        assert_eq!(element.r#for, None);
        assert_eq!(element.proto.as_deref(), Some("https"));

        assert_eq!(
            split_outside_quotes("a=\"x;b=1;c=\"y\"", ';'),
            vec!["a=\"x;b=1;c=\"y\""]
        );
        assert_eq!(
            split_outside_quotes("a=\"x;b=1;c=y", ';'),
            vec!["a=\"x", "b=1", "c=y"]
        );

        let element = ForwardedElement::parse_first(";;proto=http;proto=https;");
        assert_eq!(element.proto.as_deref(), Some("http"));

        assert_eq!(
            unquote("a\"b"),
            Err(MalformedForwardedToken::UnbalancedQuotes("a\"b".to_owned()))
        );
        assert_eq!(
            parse_pair("=value"),
            Err(MalformedForwardedToken::EmptyName("=value".to_owned()))
        );
        assert_eq!(
            parse_pair("proto"),
            Err(MalformedForwardedToken::MissingEquals("proto".to_owned()))
        );
    }

    #[test]
    fn node_names() {
        assert_eq!(node_name("192.0.2.1"), "192.0.2.1");
        assert_eq!(node_name("192.0.2.1:8080"), "192.0.2.1");
        assert_eq!(node_name("[::1]:8080"), "::1");
        assert_eq!(node_name("[::1]"), "::1");
        assert_eq!(node_name("2001:db8::1"), "2001:db8::1");
        assert_eq!(node_name("unknown"), "unknown");
        assert_eq!(node_name("_hidden:_port"), "_hidden");
    }
}
