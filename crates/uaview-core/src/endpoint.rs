// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server access point descriptors produced by endpoint discovery.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, UaError, UaResult};
use crate::types::{SecurityMode, SecurityPolicy};

/// URL scheme accepted for endpoints.
pub const URL_SCHEME: &str = "opc.tcp://";

/// One reachable combination of address and security configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint URL, `opc.tcp://host:port/path`.
    pub url: String,
    /// Security policy URI.
    pub security_policy_uri: String,
    /// Message security mode.
    pub security_mode: SecurityMode,
    /// Relative security ranking reported by the server.
    #[serde(default)]
    pub security_level: u8,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(
        url: impl Into<String>,
        security_policy: SecurityPolicy,
        security_mode: SecurityMode,
    ) -> Self {
        Self {
            url: url.into(),
            security_policy_uri: security_policy.uri().to_string(),
            security_mode,
            security_level: 0,
        }
    }

    /// Creates an unsecured endpoint for `url`.
    pub fn unsecured(url: impl Into<String>) -> Self {
        Self::new(url, SecurityPolicy::None, SecurityMode::None)
    }

    /// Returns the policy, if the URI is a well-known one.
    pub fn security_policy(&self) -> Option<SecurityPolicy> {
        SecurityPolicy::from_uri(&self.security_policy_uri)
    }

    /// Returns `true` if the endpoint neither signs nor encrypts.
    pub fn is_unsecured(&self) -> bool {
        self.security_mode == SecurityMode::None
    }

    /// Returns the `host:port` part of the URL.
    pub fn authority(&self) -> Option<&str> {
        let rest = self.url.strip_prefix(URL_SCHEME)?;
        let authority = rest.split('/').next()?;
        (!authority.is_empty()).then_some(authority)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy = self
            .security_policy_uri
            .rsplit_once('#')
            .map(|(_, name)| name)
            .unwrap_or(&self.security_policy_uri);
        write!(f, "{} [{} / {}]", self.url, policy, self.security_mode)
    }
}

/// Checks that `url` uses the `opc.tcp` scheme and names a host.
pub fn validate_url(url: &str) -> UaResult<()> {
    let Some(rest) = url.strip_prefix(URL_SCHEME) else {
        return Err(UaError::connection(ConnectionError::invalid_endpoint(
            url,
            format!("URL must start with '{URL_SCHEME}'"),
        )));
    };
    if rest.split('/').next().map_or(true, str::is_empty) {
        return Err(UaError::connection(ConnectionError::invalid_endpoint(
            url,
            "missing host",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display_and_policy() {
        let endpoint = Endpoint::new(
            "opc.tcp://plc:4840",
            SecurityPolicy::Basic256Sha256,
            SecurityMode::Sign,
        );
        assert_eq!(endpoint.security_policy(), Some(SecurityPolicy::Basic256Sha256));
        assert_eq!(endpoint.to_string(), "opc.tcp://plc:4840 [Basic256Sha256 / Sign]");
        assert!(!endpoint.is_unsecured());
        assert_eq!(endpoint.authority(), Some("plc:4840"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("opc.tcp://localhost:4840").is_ok());
        assert!(validate_url("opc.tcp://localhost:4840/UA/Server").is_ok());
        assert!(validate_url("http://localhost").is_err());
        assert!(validate_url("opc.tcp:///path").is_err());
    }
}
