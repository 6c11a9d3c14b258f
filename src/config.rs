//! Handler configuration.

use std::fmt;

/// Configuration for a Negotiate authentication handler.
///
/// Created once per handler. When `username` and `password` are not
/// supplied, the security provider is asked for the default logon
/// credentials, which allows single-sign-on against domain resources where
/// the provider supports it.
#[derive(Clone)]
pub struct AuthConfig {
    username: Option<String>,
    password: Option<String>,
    domain: String,
    service: String,
    host: Option<String>,
    delegate: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            username: None,
            password: None,
            // "." selects a local (non-domain) account.
            domain: ".".to_owned(),
            service: "HTTP".to_owned(),
            host: None,
            delegate: false,
        }
    }
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder {
            config: AuthConfig::default(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// NT domain name; `.` for a local account.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Kerberos service type used to form the target SPN.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Host override for the target SPN. When unset, the host is taken
    /// from the first request's URL and canonicalized via reverse DNS.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether the user's credentials may be delegated to the server.
    pub fn delegate(&self) -> bool {
        self.delegate
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("domain", &self.domain)
            .field("service", &self.service)
            .field("host", &self.host)
            .field("delegate", &self.delegate)
            .finish()
    }
}

/// Builder for [`AuthConfig`].
#[derive(Debug)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = domain.into();
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.config.service = service.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    pub fn delegate(mut self, delegate: bool) -> Self {
        self.config.delegate = delegate;
        self
    }

    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.domain(), ".");
        assert_eq!(config.service(), "HTTP");
        assert!(config.username().is_none());
        assert!(config.host().is_none());
        assert!(!config.delegate());
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::builder()
            .username("svc_account")
            .password("hunter2")
            .domain("CORP")
            .service("HTTPS")
            .host("web01.corp.example.com")
            .delegate(true)
            .build();

        assert_eq!(config.username(), Some("svc_account"));
        assert_eq!(config.password(), Some("hunter2"));
        assert_eq!(config.domain(), "CORP");
        assert_eq!(config.service(), "HTTPS");
        assert_eq!(config.host(), Some("web01.corp.example.com"));
        assert!(config.delegate());
    }

    #[test]
    fn debug_redacts_password() {
        let config = AuthConfig::builder().password("hunter2").build();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
    }
}
