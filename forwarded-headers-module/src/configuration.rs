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

//! Data structures required for `ForwardedHeadersHandler` configuration

use clap::Parser;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::hash_map::{Entry, HashMap};

use crate::header::ForwardedHeader;

/// Command line options of the forwarded headers module
#[derive(Debug, Default, Parser)]
pub struct ForwardedHeadersOpt {
    /// Default value of a forwarding header in the format `Name=value`, e.g.
    /// `X-Forwarded-Proto=https`. It applies to requests that don’t have this header. This
    /// command line flag can be specified multiple times.
    #[clap(long)]
    pub forwarded_default: Option<Vec<String>>,

    /// Remove forwarding headers from requests without applying them.
    #[clap(long)]
    pub forwarded_remove_only: bool,
}

/// Configuration file settings of the forwarded headers module
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForwardedHeadersConf {
    /// Default values of forwarding headers, applying to requests that don’t have them
    pub forwarded_defaults: HashMap<String, String>,

    /// If `true`, forwarding headers are removed from requests without applying them.
    pub forwarded_remove_only: bool,
}

impl ForwardedHeadersConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: ForwardedHeadersOpt) {
        for entry in opt.forwarded_default.unwrap_or_default() {
            if let Some((name, value)) = entry.split_once('=') {
                self.forwarded_defaults
                    .insert(name.trim().to_owned(), value.trim().to_owned());
            } else {
                warn!("Ignoring forwarded header default without `=`: {entry}");
            }
        }

        if opt.forwarded_remove_only {
            self.forwarded_remove_only = true;
        }
    }
}

/// Default values of forwarding headers, read-only once created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardedHeaderDefaults {
    values: HashMap<ForwardedHeader, String>,
}

impl ForwardedHeaderDefaults {
    /// Default value of a header if configured
    pub fn get(&self, header: ForwardedHeader) -> Option<&str> {
        self.values.get(&header).map(String::as_str)
    }

    /// Checks whether no defaults are configured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of configured defaults
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<K, V> FromIterator<(K, V)> for ForwardedHeaderDefaults
where
    K: AsRef<str>,
    V: Into<String>,
{
    /// Collects the defaults, entries with names that aren’t forwarding headers are dropped.
    /// If a header occurs more than once, the first entry wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = HashMap::new();
        for (name, value) in iter {
            let name = name.as_ref();
            let Some(header) = ForwardedHeader::from_name(name) else {
                warn!("Ignoring default for {name}, not a forwarding header");
                continue;
            };

            match values.entry(header) {
                Entry::Vacant(entry) => {
                    let value = entry.insert(value.into());
                    debug!("Default for {header}: {value}");
                }
                Entry::Occupied(_) => warn!("Ignoring duplicate default for {name}"),
            }
        }
        Self { values }
    }
}

impl From<&ForwardedHeadersConf> for ForwardedHeaderDefaults {
    /// Names are processed in byte order, so of names differing only in case the one sorting
    /// first wins.
    fn from(conf: &ForwardedHeadersConf) -> Self {
        let mut entries = conf.forwarded_defaults.iter().collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries
            .into_iter()
            .map(|(name, value)| (name, value.as_str()))
            .collect()
    }
}
