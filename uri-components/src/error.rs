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

//! Error type shared by all URI operations

use thiserror::Error;

use crate::encoding::UriComponentType;

/// Errors produced when building, verifying, expanding or converting URIs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    /// A character that isn’t allowed in this part of the URI survived encoding
    #[error("invalid character '{character}' for {component} in \"{value}\"")]
    InvalidComponent {
        /// The part of the URI being verified
        component: UriComponentType,
        /// The offending character
        character: char,
        /// The complete value of this URI part
        value: String,
    },

    /// A `%` character that isn’t followed by two hexadecimal digits
    #[error("invalid encoded sequence \"{sequence}\" in \"{value}\"")]
    InvalidEncodedSequence {
        /// The broken escape sequence
        sequence: String,
        /// The complete value of this URI part
        value: String,
    },

    /// A positional template variable source ran out of values
    #[error("not enough variable values available to expand '{name}'")]
    NotEnoughVariableValues {
        /// Name of the placeholder that couldn’t be expanded
        name: String,
    },

    /// A named template variable source has no value for a placeholder
    #[error("map has no value for '{name}'")]
    MissingVariable {
        /// Name of the placeholder that couldn’t be expanded
        name: String,
    },

    /// Template expansion was attempted on components that have been encoded already
    #[error("cannot expand an already encoded URI")]
    ExpandEncoded,

    /// The string isn’t a valid URI
    #[error("[{uri}] is not a valid URI: {reason}")]
    InvalidUri {
        /// The URI string
        uri: String,
        /// Why it couldn’t be accepted
        reason: String,
    },

    /// The character set name isn’t known
    #[error("unsupported charset {0}")]
    UnsupportedCharset(String),
}
