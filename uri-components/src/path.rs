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

//! The path part of a URI

use std::borrow::Cow;

use crate::encoding::{encode_uri_component, verify_uri_component, UriComponentType};
use crate::template::{expand_uri_component, UriTemplateVariables};
use crate::{Charset, UriComponentsBuilder, UriError};

/// Path delimiter
pub const PATH_DELIMITER: char = '/';

/// Path of a URI, either as a complete string or as a list of segments
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    /// Path stored as a string, `/` characters within it are delimiters
    FullPath(String),
    /// Path stored as a list of segments. Segment content never acts as a delimiter, a `/`
    /// character within a segment is data and gets escaped when encoding.
    Segments(Vec<String>),
    /// No path
    #[default]
    Empty,
}

impl PathComponent {
    /// Returns the path as a string.
    pub fn path(&self) -> Cow<'_, str> {
        match self {
            Self::FullPath(path) => Cow::Borrowed(path),
            Self::Segments(segments) => {
                let mut path = String::new();
                path.push(PATH_DELIMITER);
                for (index, segment) in segments.iter().enumerate() {
                    if index > 0 {
                        path.push(PATH_DELIMITER);
                    }
                    path.push_str(segment);
                }
                Cow::Owned(path)
            }
            Self::Empty => Cow::Borrowed(""),
        }
    }

    /// Returns the non-empty path segments.
    pub fn path_segments(&self) -> Cow<'_, [String]> {
        match self {
            Self::FullPath(path) => Cow::Owned(
                path.split(PATH_DELIMITER)
                    .filter(|segment| !segment.is_empty())
                    .map(ToOwned::to_owned)
                    .collect(),
            ),
            Self::Segments(segments) => Cow::Borrowed(segments),
            Self::Empty => Cow::Borrowed(&[]),
        }
    }

    /// Percent-encodes the path using the character set for non-ASCII characters.
    pub fn encode(&self, charset: Charset) -> Self {
        match self {
            Self::FullPath(path) => Self::FullPath(
                encode_uri_component(path, charset, UriComponentType::Path).into_owned(),
            ),
            Self::Segments(segments) => Self::Segments(
                segments
                    .iter()
                    .map(|segment| {
                        encode_uri_component(segment, charset, UriComponentType::PathSegment)
                            .into_owned()
                    })
                    .collect(),
            ),
            Self::Empty => Self::Empty,
        }
    }

    /// Checks that the encoded path contains only allowed characters.
    pub fn verify(&self) -> Result<(), UriError> {
        match self {
            Self::FullPath(path) => verify_uri_component(path, UriComponentType::Path),
            Self::Segments(segments) => segments
                .iter()
                .try_for_each(|segment| {
                    verify_uri_component(segment, UriComponentType::PathSegment)
                }),
            Self::Empty => Ok(()),
        }
    }

    /// Replaces template placeholders within the path.
    pub fn expand(&self, variables: &mut dyn UriTemplateVariables) -> Result<Self, UriError> {
        Ok(match self {
            Self::FullPath(path) => {
                Self::FullPath(expand_uri_component(path, variables)?.into_owned())
            }
            Self::Segments(segments) => Self::Segments(
                segments
                    .iter()
                    .map(|segment| {
                        expand_uri_component(segment, variables).map(Cow::into_owned)
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Self::Empty => Self::Empty,
        })
    }

    /// Adds this path to the builder, keeping its form.
    pub fn copy_to_builder(&self, builder: &mut UriComponentsBuilder) {
        match self {
            Self::FullPath(path) => {
                builder.path(path);
            }
            Self::Segments(segments) => {
                builder.path_segment(segments);
            }
            Self::Empty => {}
        }
    }

    /// Checks whether there is no path.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::FullPath(path) => path.is_empty(),
            Self::Segments(_) => false,
            Self::Empty => true,
        }
    }
}

/// Resolves `.` and `..` segments. A `..` segment that would leave the root of an absolute path
/// is dropped, for relative paths it is kept.
pub(crate) fn clean_path(path: &str) -> String {
    let absolute = path.starts_with(PATH_DELIMITER);
    let relative_path = path.strip_prefix(PATH_DELIMITER).unwrap_or(path);

    let mut segments: Vec<&str> = Vec::new();
    let mut parents = 0;
    let mut trailing_delimiter = false;
    for segment in relative_path.split(PATH_DELIMITER) {
        trailing_delimiter = false;
        match segment {
            "." => trailing_delimiter = true,
            ".." => {
                trailing_delimiter = true;
                if segments.pop().is_none() && !absolute {
                    parents += 1;
                }
            }
            segment => segments.push(segment),
        }
    }

    let mut result = String::with_capacity(path.len());
    if absolute {
        result.push(PATH_DELIMITER);
    }
    for _ in 0..parents {
        result.push_str("..");
        result.push(PATH_DELIMITER);
    }
    result.push_str(&segments.join("/"));
    if trailing_delimiter && !segments.is_empty() {
        result.push(PATH_DELIMITER);
    }
    result
}
