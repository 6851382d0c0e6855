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

//! Character sets used to convert between text and the bytes being percent-encoded

use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::UriError;

/// A character set supported for URI encoding and decoding
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    /// UTF-8
    #[default]
    Utf8,
    /// ISO-8859-1 (Latin-1), each character maps to a single byte
    Latin1,
    /// US-ASCII, seven-bit characters only
    UsAscii,
}

impl Charset {
    /// Looks up a character set by its name or one of its common aliases. The lookup is
    /// case-insensitive.
    pub fn for_name(name: &str) -> Result<Self, UriError> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" | "unicode-1-1-utf-8" => Ok(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso-latin-1" | "latin1" | "l1" | "cp819" | "ibm819"
            | "8859-1" => Ok(Self::Latin1),
            "us-ascii" | "ascii" | "iso646-us" | "us" | "ascii7" | "646" => Ok(Self::UsAscii),
            _ => Err(UriError::UnsupportedCharset(name.to_owned())),
        }
    }

    /// Canonical name of the character set
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::UsAscii => "US-ASCII",
        }
    }

    /// Converts text into bytes. Characters that cannot be represented are replaced by `?`.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        let limit = match self {
            Self::Utf8 => return Cow::Borrowed(text.as_bytes()),
            Self::Latin1 => 0xFF,
            Self::UsAscii => 0x7F,
        };

        if text.is_ascii() {
            return Cow::Borrowed(text.as_bytes());
        }

        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok().filter(|b| *b <= limit).unwrap_or(b'?'))
            .collect::<Vec<_>>()
            .into()
    }

    /// Converts bytes into text. Invalid input is replaced by U+FFFD.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes),
            _ if bytes.is_ascii() => String::from_utf8_lossy(bytes),
            Self::Latin1 => bytes.iter().copied().map(char::from).collect::<String>().into(),
            Self::UsAscii => bytes
                .iter()
                .map(|b| if b.is_ascii() { char::from(*b) } else { '\u{FFFD}' })
                .collect::<String>()
                .into(),
        }
    }
}

impl FromStr for Charset {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::for_name(s)
    }
}

impl Display for Charset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
