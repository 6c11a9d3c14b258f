//! Transparent SPNEGO (Negotiate/Kerberos/NTLM) authentication for HTTP
//! clients.
//!
//! This crate turns an intercepted HTTP 401 into a completed
//! challenge-response handshake: it picks the strongest advertised scheme
//! (`Negotiate` before `NTLM`), obtains opaque tokens from a security
//! context provider, and replays the original request with the
//! `Authorization` header attached, for up to three exchanges on the same
//! connection. Request bodies are rewound, cookies carried between rounds,
//! and TLS channel binding applied when the transport exposes the peer
//! certificate.
//!
//! The crate does not speak HTTP itself. The surrounding client supplies a
//! [`Transport`] implementation, and receives the final response with the
//! intermediate responses recorded in its history:
//!
//! ```no_run
//! use http_negotiate_sspi::{AuthConfig, Method, NegotiateAuth, Request, SendOptions, Url};
//! # fn transport() -> Box<dyn http_negotiate_sspi::Transport> { unimplemented!() }
//!
//! # fn run() -> http_negotiate_sspi::Result<()> {
//! let auth = NegotiateAuth::new(
//!     AuthConfig::builder()
//!         .username("user")
//!         .password("password")
//!         .domain("CORP")
//!         .build(),
//! );
//!
//! let mut transport = transport();
//! let request = Request::new(Method::GET, Url::parse("http://web.corp.example.com/").unwrap());
//! let response = auth.execute(transport.as_mut(), request, &SendOptions::default())?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! Token generation is delegated to the portable `sspi` crate by default;
//! a custom [`ContextProvider`] can be injected for other providers or for
//! testing.

mod challenge;
mod channel_bindings;
mod config;
mod context;
mod error;
mod negotiate;
mod replay;
mod transport;

pub use http::{HeaderMap, HeaderValue, Method, StatusCode};
pub use url::Url;

pub use crate::channel_bindings::channel_binding_token;
pub use crate::config::{AuthConfig, AuthConfigBuilder};
pub use crate::context::{ContextProvider, ContextStep, SecurityContext, SspiProvider};
pub use crate::error::{Error, Result};
pub use crate::negotiate::{NegotiateAuth, Scheme};
pub use crate::transport::{
    Body, Connection, ReplayableBody, Request, Response, ResponseBody, SendOptions, Transport,
};
