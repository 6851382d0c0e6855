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

#![doc = include_str!("../README.md")]

use clap::{Args, Parser};
use forwarded_headers_module::{ForwardedHeadersConf, ForwardedHeadersHandler, ForwardedHeadersOpt};
use http::Request;
use log::{debug, error};
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use xff_module_utils::{
    merge_conf, merge_opt, request_util, Error as ModuleError, FromYaml, RequestFilter,
    RequestWrapper, UrlPathConf, UrlPathHelper, UrlPathOpt,
};

#[derive(Debug, Error)]
enum ResolveError {
    #[error("invalid header {0:?}, expected `Name: value`")]
    HeaderArgument(String),

    #[error("could not build a request from the command line")]
    Request(#[from] http::Error),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Request description
#[derive(Debug, Args)]
struct RequestOpt {
    /// Configuration file to load. This command line flag can be specified multiple times,
    /// later files override settings from earlier ones.
    #[clap(short, long)]
    conf: Vec<PathBuf>,

    /// Path prefix the application is mounted under, e.g. /app
    #[clap(long)]
    context_path: Option<String>,

    /// Path prefix of the request handler within the application
    #[clap(long)]
    servlet_path: Option<String>,

    /// Character encoding declared by the request
    #[clap(long)]
    encoding: Option<String>,

    /// Request header in the format `Name: value`. This command line flag can be specified
    /// multiple times.
    #[clap(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request URI, either a path like /index.html?x=1 or an absolute URI
    uri: String,
}

merge_opt! {
    /// Displays how a request looks after forwarding headers have been applied.
    struct Opt {
        request: RequestOpt,
        url_path: UrlPathOpt,
        forwarded: ForwardedHeadersOpt,
    }
}

merge_conf! {
    /// Combined configuration file settings
    struct Conf {
        forwarded: ForwardedHeadersConf,
        url_path: UrlPathConf,
    }
}

fn parse_header_argument(argument: &str) -> Result<(&str, &str), ResolveError> {
    argument
        .split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ResolveError::HeaderArgument(argument.to_owned()))
}

fn build_request(opt: &RequestOpt) -> Result<Request<()>, ResolveError> {
    let mut builder = Request::get(opt.uri.as_str());
    for argument in &opt.headers {
        let (name, value) = parse_header_argument(argument)?;
        builder = builder.header(name, value);
    }
    let mut request = builder.body(())?;

    if let Some(context_path) = &opt.context_path {
        request.set_context_path(context_path.clone());
    }
    if let Some(servlet_path) = &opt.servlet_path {
        request.set_servlet_path(servlet_path.clone());
    }
    request.set_character_encoding(opt.encoding.clone());

    debug!("Request built from command line: {request:?}");
    Ok(request)
}

fn run(opt: Opt) -> Result<(), ResolveError> {
    let mut conf = Conf::load_from_files(&opt.request.conf)?;
    conf.forwarded.merge_with_opt(opt.forwarded);
    conf.url_path.merge_with_opt(opt.url_path);

    let handler = ForwardedHeadersHandler::new(conf.forwarded)?;
    let path_helper = UrlPathHelper::from(conf.url_path);

    let mut request = build_request(&opt.request)?;
    handler.request_filter(&mut request)?;

    match request_util::get_uri(&request) {
        Ok(uri) => println!("URI: {uri}"),
        Err(err) => {
            debug!("Could not reconstruct an absolute URI: {err}");
            println!("URI: {}", request.uri());
        }
    }
    println!("Original URI: {}", request.original_uri());
    println!("Client: {}", request.client_addr().unwrap_or("unknown"));
    println!("Context path: {}", request.context_path());
    println!(
        "Path within application: {}",
        path_helper.path_within_application(&request)?
    );
    println!("Lookup path: {}", path_helper.lookup_path_for_request(&request)?);
    println!("Headers:");
    print!("{}", request_util::get_headers(&request));

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Opt::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn header_arguments() {
        assert_eq!(
            parse_header_argument("X-Forwarded-Host: example.com:8080").unwrap(),
            ("X-Forwarded-Host", "example.com:8080")
        );
        assert_eq!(parse_header_argument("Empty:").unwrap(), ("Empty", ""));
        assert!(matches!(
            parse_header_argument("no colon"),
            Err(ResolveError::HeaderArgument(_))
        ));
        assert!(matches!(
            parse_header_argument(": value"),
            Err(ResolveError::HeaderArgument(_))
        ));
    }

    #[test]
    fn request_from_command_line() {
        let opt = Opt::parse_from([
            "forwarded-resolve",
            "--context-path",
            "/ctx",
            "--encoding",
            "UTF-8",
            "-H",
            "Host: backend",
            "-H",
            "X-Forwarded-Prefix: /app",
            "--keep-semicolon-content",
            "--forwarded-default",
            "X-Forwarded-Proto=https",
            "/ctx/index.html",
        ]);
        assert!(opt.url_path.keep_semicolon_content);
        assert_eq!(
            opt.forwarded.forwarded_default,
            Some(vec!["X-Forwarded-Proto=https".to_owned()])
        );

        let request = build_request(&opt.request).unwrap();
        assert_eq!(request.uri(), "/ctx/index.html");
        assert_eq!(request.context_path(), "/ctx");
        assert_eq!(request.character_encoding(), Some("UTF-8"));
        assert_eq!(request.headers().len(), 2);

        let opt = Opt::parse_from(["forwarded-resolve", "-H", "Bad Header: x", "/"]);
        assert!(matches!(
            build_request(&opt.request),
            Err(ResolveError::Request(_))
        ));
    }

    #[test]
    fn resolve() {
        let opt = Opt::parse_from([
            "forwarded-resolve",
            "-H",
            "Host: backend:8080",
            "-H",
            "Forwarded: for=192.0.2.1;proto=https;host=example.com",
            "/index.html",
        ]);
        assert!(run(opt).is_ok());
    }
}
