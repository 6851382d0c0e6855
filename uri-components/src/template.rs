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

//! URI template variables and `{name}` placeholder expansion

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;

use crate::UriError;

// Placeholder names cannot contain a slash, `{name:regex}` is accepted as well.
static NAMES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^/]+?)\}").unwrap());

/// A source of values for URI template placeholders
pub trait UriTemplateVariables {
    /// Produces the value for the placeholder with the given name.
    fn value(&mut self, name: &str) -> Result<String, UriError>;
}

/// Template variables taken from a sequence of values, in order of appearance of the
/// placeholders. Placeholder names are irrelevant.
#[derive(Debug)]
pub struct VarArgsTemplateVariables<I> {
    values: I,
}

impl<I: Iterator> VarArgsTemplateVariables<I> {
    /// Creates template variables consuming the given values.
    pub fn new(values: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }
}

impl<I> UriTemplateVariables for VarArgsTemplateVariables<I>
where
    I: Iterator,
    I::Item: Display,
{
    fn value(&mut self, name: &str) -> Result<String, UriError> {
        self.values
            .next()
            .map(|value| value.to_string())
            .ok_or_else(|| UriError::NotEnoughVariableValues {
                name: name.to_owned(),
            })
    }
}

/// Template variables looked up by placeholder name
#[derive(Debug)]
pub struct MapTemplateVariables<'a, V> {
    values: &'a HashMap<String, V>,
}

impl<'a, V: Display> MapTemplateVariables<'a, V> {
    /// Creates template variables backed by the map.
    pub fn new(values: &'a HashMap<String, V>) -> Self {
        Self { values }
    }
}

impl<V: Display> UriTemplateVariables for MapTemplateVariables<'_, V> {
    fn value(&mut self, name: &str) -> Result<String, UriError> {
        self.values
            .get(name)
            .map(|value| value.to_string())
            .ok_or_else(|| UriError::MissingVariable {
                name: name.to_owned(),
            })
    }
}

fn variable_name(placeholder: &str) -> &str {
    placeholder
        .split_once(':')
        .map_or(placeholder, |(name, _)| name)
}

/// Replaces all placeholders within a single URI part, left to right.
pub(crate) fn expand_uri_component<'a>(
    source: &'a str,
    variables: &mut dyn UriTemplateVariables,
) -> Result<Cow<'a, str>, UriError> {
    if !source.contains('{') {
        return Ok(Cow::Borrowed(source));
    }

    let mut result = String::with_capacity(source.len());
    let mut last = 0;
    for captures in NAMES_PATTERN.captures_iter(source) {
        let (Some(whole), Some(placeholder)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        result.push_str(&source[last..whole.start()]);
        result.push_str(&variables.value(variable_name(placeholder.as_str()))?);
        last = whole.end();
    }
    result.push_str(&source[last..]);
    Ok(Cow::Owned(result))
}

pub(crate) fn expand_optional(
    source: &Option<String>,
    variables: &mut dyn UriTemplateVariables,
) -> Result<Option<String>, UriError> {
    source
        .as_deref()
        .map(|source| expand_uri_component(source, variables).map(Cow::into_owned))
        .transpose()
}
