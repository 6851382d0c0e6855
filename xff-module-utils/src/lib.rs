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

//! # Module helpers
//!
//! This crate contains helpers shared by request processing modules such as
//! `forwarded-headers-module`: the [`RequestWrapper`] abstraction over HTTP requests, the
//! [`RequestFilter`] trait implemented by request handlers, the [`UrlPathHelper`] resolving the
//! path of a request relative to the application, and configuration loading.

mod headers;
mod request;
pub mod request_util;
mod url_path;

pub use headers::HttpHeaders;
pub use request::{default_port, split_host_port, RequestWrapper};
pub use url_path::{UrlPathConf, UrlPathHelper, UrlPathOpt, UrlPathSettings};

use http::header::InvalidHeaderValue;
use http::HeaderName;
use log::trace;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uri_components::UriError;

/// Errors produced by request processing modules
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be opened
    #[error("failed opening configuration file {path:?}")]
    FileOpen {
        /// Path of the configuration file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("failed reading configuration")]
    FileRead(#[from] serde_yaml::Error),

    /// The URI assembled from request data isn’t valid
    #[error("could not build a valid URI from [{uri}]")]
    InvalidUri {
        /// The URI string assembled
        uri: String,
        /// Parser error
        #[source]
        source: http::uri::InvalidUri,
    },

    /// Neither the request encoding nor the default encoding are supported
    #[error("unsupported encoding {0}")]
    UnsupportedEncoding(String),

    /// Building or encoding URI components failed
    #[error(transparent)]
    Uri(#[from] UriError),

    /// A value cannot be used as the value of an HTTP header
    #[error("invalid value for header {name}")]
    InvalidHeader {
        /// Name of the header
        name: HeaderName,
        /// The underlying error
        #[source]
        source: InvalidHeaderValue,
    },
}

/// Request filter result indicating how the current request should be processed further
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestFilterResult {
    /// Request has been handled and further request filters should not run.
    Handled,

    /// Request filter did not consume this request, next request filter should run if it
    /// exists. The request might have been modified however.
    #[default]
    Unhandled,
}

/// Trait to be implemented by request filters.
pub trait RequestFilter {
    /// Configuration type of this handler.
    type Conf;

    /// Creates a new instance of the handler from its configuration.
    fn new(conf: Self::Conf) -> Result<Self, Error>
    where
        Self: Sized,
        Self::Conf: TryInto<Self, Error = Error>,
    {
        conf.try_into()
    }

    /// Processes the current request.
    fn request_filter(
        &self,
        request: &mut impl RequestWrapper,
    ) -> Result<RequestFilterResult, Error>;
}

/// Trait for configuration structures that can be loaded from YAML. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml(yaml: impl AsRef<str>) -> Result<Self, Error>
    where
        Self: Sized;

    /// Loads configuration from multiple YAML files. Settings from later files override the
    /// same settings in earlier files, nested mappings are merged.
    fn load_from_files<P>(paths: &[P]) -> Result<Self, Error>
    where
        P: AsRef<Path>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug + ?Sized,
{
    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(|source| Error::FileOpen {
            path: path.as_ref().to_owned(),
            source,
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader)?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml(yaml: impl AsRef<str>) -> Result<Self, Error> {
        let conf = serde_yaml::from_str(yaml.as_ref())?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }

    fn load_from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let mut merged = Value::Mapping(Mapping::new());
        for path in paths {
            let value = Value::load_from_yaml(path)?;
            merge_yaml(&mut merged, value);
        }

        let conf = serde_yaml::from_value(merged)?;
        trace!("Merged configuration: {conf:#?}");

        Ok(conf)
    }
}

fn merge_yaml(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Mapping(target), Value::Mapping(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        // Null documents keep existing settings
        (_, Value::Null) => {}
        (target, source) => *target = source,
    }
}

/// This macro merges multiple structures implementing `clap::Args` into a structure containing
/// all of them, so that all command line flags can be used.
///
/// ```rust
/// use clap::{Args, Parser};
/// use xff_module_utils::{merge_opt, UrlPathOpt};
///
/// #[derive(Debug, Args)]
/// struct MyAppOpt {
///     /// Request URI to resolve
///     uri: String,
/// }
///
/// merge_opt! {
///     /// Resolves request paths.
///     struct Opt {
///         app: MyAppOpt,
///         url_path: UrlPathOpt,
///     }
/// }
///
/// let opt = Opt::parse_from(["app", "--keep-semicolon-content", "/a;b"]);
/// assert_eq!(opt.app.uri, "/a;b");
/// assert!(opt.url_path.keep_semicolon_content);
/// ```
#[macro_export]
macro_rules! merge_opt {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::clap::Parser)]
        $struct_vis struct $struct_name {
            $(
                #[clap(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}

/// This macro merges multiple structures implementing [`serde::Deserialize`] and [`Default`]
/// into a structure containing all of them.
///
/// The structure of the expected configuration file is flattened, so that the configuration
/// settings from each component are still expected to be found on the top level.
///
/// ```rust
/// use serde::Deserialize;
/// use xff_module_utils::{merge_conf, FromYaml, UrlPathConf};
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct MyAppConf {
///     verbose: bool,
/// }
///
/// merge_conf! {
///     struct Conf {
///         app: MyAppConf,
///         url_path: UrlPathConf,
///     }
/// }
///
/// let conf = Conf::from_yaml("verbose: true\nurl_path:\n  url_decode: false").unwrap();
/// assert!(conf.app.verbose);
/// assert!(!conf.url_path.url_path.url_decode);
/// ```
#[macro_export]
macro_rules! merge_conf {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::std::default::Default, ::serde::Deserialize)]
        #[serde(default)]
        $struct_vis struct $struct_name {
            $(
                #[serde(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}
