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

//! # URI components
//!
//! This crate provides an immutable structured URI representation. A URI is split up into
//! scheme, user info, host, port, path, query parameters and fragment, and each part is
//! percent-encoded according to the characters allowed in it. Paths can be kept as a single
//! string or as a list of segments, the latter escape `/` characters within a segment.
//!
//! URIs are assembled with [`UriComponentsBuilder`]:
//!
//! ```rust
//! use uri_components::{Charset, UriComponentsBuilder};
//!
//! let components = UriComponentsBuilder::from_uri_string("https://example.com/users/{id}")
//!     .unwrap()
//!     .query_param("tab", ["all posts"])
//!     .build()
//!     .expand_values([42])
//!     .unwrap()
//!     .encode(Charset::Utf8);
//! assert_eq!(
//!     components.to_uri_string(),
//!     "https://example.com/users/42?tab=all%20posts"
//! );
//! ```
//!
//! Decoding is available through [`decode`], it never fails: invalid escape sequences are
//! kept unchanged.

mod builder;
mod charset;
mod components;
mod encoding;
mod error;
mod multi_value_map;
mod path;
mod template;

pub use builder::UriComponentsBuilder;
pub use charset::Charset;
pub use components::{QueryParams, UriComponents};
pub use encoding::{decode, encode, encode_uri_component, verify_uri_component, UriComponentType};
pub use error::UriError;
pub use multi_value_map::LinkedMultiValueMap;
pub use path::{PathComponent, PATH_DELIMITER};
pub use template::{MapTemplateVariables, UriTemplateVariables, VarArgsTemplateVariables};
