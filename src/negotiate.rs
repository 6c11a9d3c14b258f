//! The Negotiate authentication retry state machine.
//!
//! Implements the HTTP "Negotiate" authentication scheme (RFC 4559) as a
//! response interceptor: a 401 carrying a supported challenge scheme is
//! turned into a handshake of at most two further exchanges on the same
//! connection, and the final response is handed to the caller in place of
//! the original 401.

use std::fmt;
use std::sync::OnceLock;

use base64::Engine as _;
use http::header::{AUTHORIZATION, CONNECTION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::challenge::extract_challenge;
use crate::channel_bindings::channel_binding_token;
use crate::config::AuthConfig;
use crate::context::{ContextProvider, SecurityContext, SspiProvider};
use crate::replay::replay;
use crate::transport::{Request, Response, SendOptions, Transport};
use crate::{Error, Result};

/// An authentication scheme advertised in `WWW-Authenticate`.
///
/// `Negotiate` is preferred over `NTLM` when a server advertises both; the
/// first match fixes the scheme for the rest of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Negotiate,
    Ntlm,
}

impl Scheme {
    const PREFERENCE: [Scheme; 2] = [Scheme::Negotiate, Scheme::Ntlm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Negotiate => "Negotiate",
            Scheme::Ntlm => "NTLM",
        }
    }

    /// Picks the scheme for a 401 response, checking the supported schemes
    /// in preference order against every `WWW-Authenticate` value,
    /// case-insensitively.
    pub(crate) fn detect(headers: &HeaderMap) -> Option<Scheme> {
        for scheme in Scheme::PREFERENCE {
            let needle = scheme.as_str().to_ascii_lowercase();
            for value in headers.get_all(WWW_AUTHENTICATE) {
                if let Ok(value) = value.to_str() {
                    if value.to_ascii_lowercase().contains(&needle) {
                        return Some(scheme);
                    }
                }
            }
        }
        None
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transparent Negotiate/NTLM authentication for an HTTP client.
///
/// One handler instance is shared across requests; each intercepted 401
/// gets its own security context session. The only cross-request state is
/// the lazily resolved target host.
pub struct NegotiateAuth {
    config: AuthConfig,
    provider: Box<dyn ContextProvider>,
    host: OnceLock<String>,
}

impl NegotiateAuth {
    pub fn new(config: AuthConfig) -> NegotiateAuth {
        NegotiateAuth::with_provider(config, Box::new(SspiProvider))
    }

    /// Uses a custom security context provider instead of the sspi-backed
    /// default.
    pub fn with_provider(config: AuthConfig, provider: Box<dyn ContextProvider>) -> NegotiateAuth {
        NegotiateAuth {
            config,
            provider,
            host: OnceLock::new(),
        }
    }

    /// Tags an outgoing request for authentication.
    ///
    /// The handshake reuses one connection across its exchanges, so every
    /// authenticated request pins `Connection: Keep-Alive`.
    pub fn prepare(&self, request: &mut Request) {
        request
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
    }

    /// Sends a request and completes any authentication handshake the
    /// server demands before returning the final response.
    pub fn execute(
        &self,
        transport: &mut dyn Transport,
        mut request: Request,
        options: &SendOptions,
    ) -> Result<Response> {
        self.prepare(&mut request);
        let response = transport.send(request, options)?;
        self.handle_response(response, transport, options)
    }

    /// Inspects a received response and, when it is a 401 advertising a
    /// supported scheme, drives the handshake to completion. Any other
    /// response is returned unchanged.
    pub fn handle_response(
        &self,
        response: Response,
        transport: &mut dyn Transport,
        options: &SendOptions,
    ) -> Result<Response> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        match Scheme::detect(response.headers()) {
            Some(scheme) => self.retry_with_auth(response, scheme, transport, options),
            None => Ok(response),
        }
    }

    fn retry_with_auth(
        &self,
        mut response: Response,
        scheme: Scheme,
        transport: &mut dyn Transport,
        options: &SendOptions,
    ) -> Result<Response> {
        // A request that already carried credentials and still got a 401
        // is not retried; engaging again would loop forever.
        if response.request().headers().contains_key(AUTHORIZATION) {
            return Ok(response);
        }

        let target_spn = format!("{}/{}", self.config.service(), self.target_host(&response));

        let bindings = response.peer_certificate().map(channel_binding_token);

        let mut session = match self.provider.new_session(scheme, &target_spn, &self.config) {
            Ok(session) => session,
            Err(err) => {
                log::debug!("could not create {} context for {}: {}", scheme, target_spn, err);
                return Ok(response);
            }
        };

        // First leg: replay the original request with the initial context
        // token attached.
        let mut request = replay(&mut response)?;
        let step = match session.step(None, bindings.as_deref()) {
            Ok(step) => step,
            Err(err) => {
                log::debug!("initial {} context step failed: {}", scheme, err);
                return Ok(response);
            }
        };
        set_authorization(&mut request, scheme, &step.token)?;
        log::debug!(
            "sending initial context token, authenticated={}",
            step.complete
        );

        // The challenge exchange is never streamed: we expect a short
        // challenge, not content, and a streamed body would corrupt the
        // exchange. The caller's streaming preference is restored on the
        // request that carries the final answer.
        let challenge_options = SendOptions { stream: false };
        let mut challenge_response = transport.send(request, &challenge_options)?;

        // Anything but a second 401 resolves the handshake one way or the
        // other.
        if challenge_response.status() != StatusCode::UNAUTHORIZED {
            if challenge_response.status() == StatusCode::OK
                && challenge_response.headers().contains_key(WWW_AUTHENTICATE)
            {
                finalize_context(session.as_mut(), scheme, challenge_response.headers());
            }
            challenge_response.history_mut().push(response);
            return Ok(challenge_response);
        }

        // Second leg: the server answered with a concrete challenge
        // (challenge-response, i.e. NTLM).
        let mut request = replay(&mut challenge_response)?;
        let challenge = extract_challenge(challenge_response.headers(), scheme)?;
        log::debug!("got {} challenge token", scheme);

        let step = match session.step(Some(&challenge), None) {
            Ok(step) => step,
            Err(err) => {
                log::debug!("{} challenge response step failed: {}", scheme, err);
                challenge_response.history_mut().push(response);
                return Ok(challenge_response);
            }
        };
        set_authorization(&mut request, scheme, &step.token)?;
        log::debug!(
            "sending challenge response, authenticated={}",
            step.complete
        );

        // Terminal exchange regardless of its outcome.
        let mut final_response = transport.send(request, options)?;
        final_response.history_mut().push(response);
        final_response.history_mut().push(challenge_response);
        Ok(final_response)
    }

    /// The host part of the target SPN, resolved once per handler: the
    /// configured override, or the first request's host canonicalized via
    /// reverse DNS (falling back to the literal hostname).
    fn target_host(&self, response: &Response) -> &str {
        self.host.get_or_init(|| {
            if let Some(host) = self.config.host() {
                return host.to_owned();
            }
            let host = response
                .request()
                .url()
                .host_str()
                .unwrap_or_default()
                .to_owned();
            canonical_host_name(&host)
        })
    }
}

impl fmt::Debug for NegotiateAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiateAuth")
            .field("config", &self.config)
            .field("host", &self.host.get())
            .finish()
    }
}

/// Lets the session consume the server's confirmation token on a 200.
/// Best-effort: a failure here never changes the returned response, so
/// both an undecodable token and a provider error are only logged.
fn finalize_context(session: &mut dyn SecurityContext, scheme: Scheme, headers: &HeaderMap) {
    let Some(value) = headers
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
    else {
        return;
    };

    // Windows sometimes omits the scheme prefix on the success token and
    // sends a bare base64 chunk, so strip the prefix leniently.
    let token = value.replacen(scheme.as_str(), "", 1);
    match base64::engine::general_purpose::STANDARD.decode(token.trim_start()) {
        Ok(token) => match session.step(Some(&token), None) {
            Ok(step) => log::debug!(
                "{} context finalized, authenticated={}",
                scheme,
                step.complete
            ),
            Err(err) => log::debug!("ignoring {} finalization failure: {}", scheme, err),
        },
        Err(err) => log::debug!("ignoring undecodable {} confirmation token: {}", scheme, err),
    }
}

fn set_authorization(request: &mut Request, scheme: Scheme, token: &[u8]) -> Result<()> {
    let value = format!(
        "{} {}",
        scheme,
        base64::engine::general_purpose::STANDARD.encode(token)
    );
    let value = HeaderValue::from_str(&value)
        .map_err(|_| Error::Request("invalid authorization header".to_owned()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Canonicalizes a hostname through forward then reverse DNS, as Kerberos
/// SPNs are registered against canonical names. Resolution failure is
/// non-fatal; the literal hostname is used instead.
fn canonical_host_name(host: &str) -> String {
    let addr = match dns_lookup::lookup_host(host) {
        Ok(addrs) => addrs.into_iter().next(),
        Err(err) => {
            log::info!("skipping canonicalization of name {}: {}", host, err);
            None
        }
    };
    let Some(addr) = addr else {
        return host.to_owned();
    };
    match dns_lookup::lookup_addr(&addr) {
        Ok(name) => name,
        Err(err) => {
            log::info!("skipping canonicalization of name {}: {}", host, err);
            host.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use url::Url;

    use super::*;

    fn www_authenticate(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn detect_prefers_negotiate_over_ntlm() {
        let headers = www_authenticate(&["NTLM", "Negotiate"]);
        assert_eq!(Scheme::detect(&headers), Some(Scheme::Negotiate));
    }

    #[test]
    fn detect_is_case_insensitive() {
        let headers = www_authenticate(&["NEGOTIATE"]);
        assert_eq!(Scheme::detect(&headers), Some(Scheme::Negotiate));

        let headers = www_authenticate(&["ntlm"]);
        assert_eq!(Scheme::detect(&headers), Some(Scheme::Ntlm));
    }

    #[test]
    fn detect_ignores_unsupported_schemes() {
        let headers = www_authenticate(&["Basic realm=\"x\"", "Bearer"]);
        assert_eq!(Scheme::detect(&headers), None);
    }

    #[test]
    fn detect_finds_scheme_with_token() {
        let headers = www_authenticate(&["NTLM TlRMTVNTUAACAAAA"]);
        assert_eq!(Scheme::detect(&headers), Some(Scheme::Ntlm));
    }

    #[test]
    fn authorization_header_format() {
        let mut request =
            Request::new(Method::GET, Url::parse("http://web.example.com/").unwrap());
        set_authorization(&mut request, Scheme::Negotiate, b"token").unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            &HeaderValue::from_static("Negotiate dG9rZW4=")
        );
    }

    #[test]
    fn prepare_pins_keep_alive() {
        let auth = NegotiateAuth::new(AuthConfig::default());
        let mut request =
            Request::new(Method::GET, Url::parse("http://web.example.com/").unwrap());
        auth.prepare(&mut request);

        assert_eq!(
            request.headers().get(CONNECTION).unwrap(),
            &HeaderValue::from_static("Keep-Alive")
        );
    }
}
