//! Security context provider boundary.
//!
//! The handshake core consumes the platform security provider through the
//! [`ContextProvider`]/[`SecurityContext`] pair: one stateful session per
//! authentication attempt, stepped with opaque tokens until the provider
//! reports completion. [`SspiProvider`] is the default implementation,
//! backed by the portable `sspi` crate.

use sspi::builders::{AcquireCredentialsHandle, WithoutCredentialUse};
use sspi::credssp::SspiContext;
use sspi::ntlm::NtlmConfig;
use sspi::{
    AcquireCredentialsHandleResult, AuthIdentity, BufferType, ClientRequestFlags, CredentialUse,
    Credentials, CredentialsBuffers, DataRepresentation, InitializeSecurityContextResult,
    Negotiate, NegotiateConfig, Ntlm, SecurityBuffer, SecurityStatus, Sspi, Username,
};

use crate::config::AuthConfig;
use crate::negotiate::Scheme;
use crate::{Error, Result};

/// The outcome of one context step.
#[derive(Debug)]
pub struct ContextStep {
    /// Token to send to the server.
    pub token: Vec<u8>,
    /// Whether the provider considers the handshake established.
    pub complete: bool,
}

/// One in-flight handshake session, bound to a single scheme and target
/// SPN. Never shared across requests.
pub trait SecurityContext: Send {
    /// Feeds the server's token (if any) into the context and produces the
    /// next client token. A channel-binding token may be supplied on the
    /// first call only.
    fn step(
        &mut self,
        server_token: Option<&[u8]>,
        channel_bindings: Option<&[u8]>,
    ) -> Result<ContextStep>;
}

/// Creates [`SecurityContext`] sessions for the handshake core.
pub trait ContextProvider: Send + Sync {
    fn new_session(
        &self,
        scheme: Scheme,
        target_spn: &str,
        config: &AuthConfig,
    ) -> Result<Box<dyn SecurityContext>>;
}

/// Default provider backed by the `sspi` crate.
#[derive(Debug, Default)]
pub struct SspiProvider;

impl ContextProvider for SspiProvider {
    fn new_session(
        &self,
        scheme: Scheme,
        target_spn: &str,
        config: &AuthConfig,
    ) -> Result<Box<dyn SecurityContext>> {
        let credentials = client_credentials(config)?;
        let hostname = client_hostname();

        let mut context = match scheme {
            Scheme::Negotiate => {
                let negotiate_config = NegotiateConfig::new(
                    Box::new(NtlmConfig::new(hostname.clone())),
                    Some("kerberos,ntlm".to_owned()),
                    hostname,
                );
                SspiContext::Negotiate(Negotiate::new_client(negotiate_config)?)
            }
            Scheme::Ntlm => SspiContext::Ntlm(Ntlm::with_config(NtlmConfig::new(hostname))),
        };

        let builder = AcquireCredentialsHandle::<'_, _, _, WithoutCredentialUse>::new();
        let AcquireCredentialsHandleResult {
            credentials_handle, ..
        } = builder
            .with_auth_data(&credentials)
            .with_credential_use(CredentialUse::Outbound)
            .execute(&mut context)?;

        let mut flags = ClientRequestFlags::MUTUAL_AUTH
            | ClientRequestFlags::REPLAY_DETECT
            | ClientRequestFlags::SEQUENCE_DETECT;
        if config.delegate() {
            flags |= ClientRequestFlags::DELEGATE;
        }

        Ok(Box::new(SspiSession {
            context,
            credentials_handle,
            target: target_spn.to_owned(),
            flags,
            bindings: None,
            stepped: false,
        }))
    }
}

struct SspiSession {
    context: SspiContext,
    credentials_handle: Option<CredentialsBuffers>,
    target: String,
    flags: ClientRequestFlags,
    bindings: Option<Vec<u8>>,
    stepped: bool,
}

impl SecurityContext for SspiSession {
    fn step(
        &mut self,
        server_token: Option<&[u8]>,
        channel_bindings: Option<&[u8]>,
    ) -> Result<ContextStep> {
        if channel_bindings.is_some() {
            if self.stepped {
                return Err(Error::Context(
                    "channel bindings may only be supplied on the first step".to_owned(),
                ));
            }
            self.bindings = channel_bindings.map(<[u8]>::to_vec);
        }

        let mut input = Vec::new();
        if let Some(token) = server_token {
            input.push(SecurityBuffer::new(token.to_vec(), BufferType::Token));
        }
        // The provider consumes the binding buffer at whichever handshake
        // state the negotiated protocol reads it, so it rides along on
        // every call.
        if let Some(bindings) = &self.bindings {
            input.push(SecurityBuffer::new(
                bindings.clone(),
                BufferType::ChannelBindings,
            ));
        }
        let mut output = [SecurityBuffer::new(Vec::new(), BufferType::Token)];

        let mut builder = self
            .context
            .initialize_security_context()
            .with_credentials_handle(&mut self.credentials_handle)
            .with_context_requirements(self.flags)
            .with_target_data_representation(DataRepresentation::Native)
            .with_target_name(&self.target)
            .with_input(&mut input)
            .with_output(&mut output);
        let InitializeSecurityContextResult { status, .. } =
            self.context.initialize_security_context_sync(&mut builder)?;

        self.stepped = true;

        let complete = match status {
            SecurityStatus::Ok | SecurityStatus::CompleteNeeded => true,
            SecurityStatus::ContinueNeeded | SecurityStatus::CompleteAndContinue => false,
            status => {
                return Err(Error::Context(format!(
                    "unexpected security status: {:?}",
                    status
                )))
            }
        };

        let token = std::mem::take(&mut output[0].buffer);
        Ok(ContextStep { token, complete })
    }
}

fn client_credentials(config: &AuthConfig) -> Result<Credentials> {
    let (Some(username), Some(password)) = (config.username(), config.password()) else {
        return Err(Error::Credential(
            "no credentials supplied and no default logon credentials are available".to_owned(),
        ));
    };

    let username = Username::new(username, Some(config.domain()))?;
    Ok(Credentials::AuthIdentity(AuthIdentity {
        username,
        password: password.to_owned().into(),
    }))
}

fn client_hostname() -> String {
    whoami::fallible::hostname().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit_config() -> AuthConfig {
        AuthConfig::builder()
            .username("test_user")
            .password("test_password")
            .domain("EXAMPLE")
            .build()
    }

    #[test]
    fn missing_credentials_is_a_credential_error() {
        let err = SspiProvider
            .new_session(Scheme::Negotiate, "HTTP/web.example.com", &AuthConfig::default())
            .unwrap_err();
        assert!(err.is_credential());
    }

    #[test]
    fn ntlm_first_step_produces_a_token() {
        let mut session = SspiProvider
            .new_session(Scheme::Ntlm, "HTTP/web.example.com", &explicit_config())
            .unwrap();

        let step = session.step(None, None).unwrap();
        assert!(!step.token.is_empty());
        assert!(!step.complete);
    }

    #[test]
    fn channel_bindings_rejected_after_first_step() {
        let mut session = SspiProvider
            .new_session(Scheme::Ntlm, "HTTP/web.example.com", &explicit_config())
            .unwrap();
        let bindings = crate::channel_bindings::channel_binding_token(b"certificate");

        session.step(None, Some(&bindings)).unwrap();
        let err = session.step(Some(&[]), Some(&bindings)).unwrap_err();
        assert!(err.is_context());
    }
}
