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

//! # Forwarded Headers Module
//!
//! This crate helps applications running behind reverse proxies or load balancers. Proxies pass
//! on information about the original request in the `Forwarded` header
//! ([RFC 7239](https://datatracker.ietf.org/doc/html/rfc7239)) or the legacy `X-Forwarded-Host`,
//! `X-Forwarded-Port`, `X-Forwarded-Proto`, `X-Forwarded-Prefix`, `X-Forwarded-Ssl` and
//! `X-Forwarded-For` headers. The handler applies this information: the request URI is rewritten
//! to the one requested by the client, the `Host` header and the context path are adjusted and
//! the client address is stored with the request. The forwarding headers are removed afterwards.
//!
//! Only the headers are trusted, it is the responsibility of the proxies to remove forwarding
//! headers sent by clients.
//!
//! Default values can be configured for requests that don’t contain some headers:
//!
//! ```yaml
//! forwarded_defaults:
//!   X-Forwarded-Proto: https
//!   X-Forwarded-Prefix: /app
//! forwarded_remove_only: false
//! ```
//!
//! If `forwarded_remove_only` is `true`, forwarding headers are removed without being applied.
//!
//! ## Code example
//!
//! ```rust
//! use forwarded_headers_module::{ForwardedHeadersConf, ForwardedHeadersHandler};
//! use http::Request;
//! use xff_module_utils::{FromYaml, RequestFilter, RequestWrapper};
//!
//! let conf = ForwardedHeadersConf::from_yaml("forwarded_defaults:\n  X-Forwarded-Proto: https")
//!     .unwrap();
//! let handler = ForwardedHeadersHandler::new(conf).unwrap();
//!
//! let mut request = Request::get("/index.html")
//!     .header("Host", "backend:8080")
//!     .header("X-Forwarded-Host", "example.com")
//!     .header("X-Forwarded-For", "192.0.2.1")
//!     .body(())
//!     .unwrap();
//! handler.request_filter(&mut request).unwrap();
//!
//! assert_eq!(request.uri(), "https://example.com/index.html");
//! assert_eq!(request.client_addr(), Some("192.0.2.1"));
//! assert!(!request.headers().contains_key("x-forwarded-host"));
//! ```

mod configuration;
mod handler;
mod header;
mod parser;

pub use configuration::{ForwardedHeaderDefaults, ForwardedHeadersConf, ForwardedHeadersOpt};
pub use handler::{ForwardedHeadersHandler, ForwardedResolution};
pub use header::ForwardedHeader;
pub use parser::ForwardedElement;
