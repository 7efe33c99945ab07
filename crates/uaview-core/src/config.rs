// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-wide settings and default subscription/monitoring parameters.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use uaview_core::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .application_name("Line 3 Viewer")
//!     .poll_interval(Duration::from_millis(250))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.poll_interval, Duration::from_millis(250));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaError, UaResult};
use crate::types::MonitoringMode;

// =============================================================================
// ClientConfig
// =============================================================================

/// Settings shared by every connection a manager creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name presented to servers.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI; derived from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Product URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,

    /// Session name; derived from the connection id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Deadline for the handshake.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline for endpoint discovery.
    #[serde(default = "default_discovery_timeout", with = "humantime_serde")]
    pub discovery_timeout: Duration,

    /// Period of the per-connection poll loop.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Capacity of per-subscription broadcast channels.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Directory holding the client PKI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<String>,

    /// Accept any server certificate.
    #[serde(default)]
    pub trust_server_certs: bool,

    /// Session retry limit handed to the protocol stack.
    #[serde(default)]
    pub session_retry_limit: i32,

    /// Default subscription parameters.
    #[serde(default)]
    pub subscription: SubscriptionParameters,

    /// Default monitored item parameters.
    #[serde(default)]
    pub monitoring: MonitoringParameters,
}

fn default_application_name() -> String {
    "UaView Client".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_discovery_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_event_channel_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: None,
            product_uri: None,
            session_name: None,
            session_timeout: default_session_timeout(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            discovery_timeout: default_discovery_timeout(),
            poll_interval: default_poll_interval(),
            event_channel_capacity: default_event_channel_capacity(),
            pki_dir: None,
            trust_server_certs: false,
            session_retry_limit: 0,
            subscription: SubscriptionParameters::default(),
            monitoring: MonitoringParameters::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> UaResult<()> {
        if self.application_name.trim().is_empty() {
            return Err(UaError::missing_field("application_name"));
        }

        for (field, value) in [
            ("session_timeout", self.session_timeout),
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("discovery_timeout", self.discovery_timeout),
            ("poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(UaError::configuration(ConfigurationError::invalid_value(
                    field,
                    "must be greater than 0",
                )));
            }
        }

        if self.event_channel_capacity == 0 {
            return Err(UaError::configuration(ConfigurationError::invalid_value(
                "event_channel_capacity",
                "must be greater than 0",
            )));
        }

        self.subscription.validate()?;
        self.monitoring.validate()
    }

    /// Returns the application URI, deriving one from the name if unset.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri
            .clone()
            .unwrap_or_else(|| format!("urn:uaview:{}", self.application_name.replace(' ', "")))
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = Some(uri.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the handshake deadline.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the endpoint discovery deadline.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery_timeout = timeout;
        self
    }

    /// Sets the poll loop period.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Sets the subscription channel capacity.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Sets the PKI directory.
    pub fn pki_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.pki_dir = Some(dir.into());
        self
    }

    /// Accepts any server certificate.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.config.trust_server_certs = trust;
        self
    }

    /// Sets the default subscription parameters.
    pub fn subscription(mut self, params: SubscriptionParameters) -> Self {
        self.config.subscription = params;
        self
    }

    /// Sets the default monitoring parameters.
    pub fn monitoring(mut self, params: MonitoringParameters) -> Self {
        self.config.monitoring = params;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> UaResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// SubscriptionParameters
// =============================================================================

/// Server-side subscription settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionParameters {
    /// Publishing interval.
    #[serde(default = "default_publishing_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Publishing intervals without a publish request before expiry.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Publishing intervals without notifications before a keep-alive.
    #[serde(default = "default_keep_alive_count")]
    pub max_keep_alive_count: u32,

    /// Maximum notifications per publish; 0 means unlimited.
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Relative priority.
    #[serde(default)]
    pub priority: u8,

    /// Whether publishing starts enabled.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_lifetime_count() -> u32 {
    2400
}

fn default_keep_alive_count() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionParameters {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            lifetime_count: default_lifetime_count(),
            max_keep_alive_count: default_keep_alive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

impl SubscriptionParameters {
    /// Creates parameters with a custom publishing interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            publishing_interval: interval,
            ..Default::default()
        }
    }

    /// Validates the parameters.
    pub fn validate(&self) -> UaResult<()> {
        if self.publishing_interval.is_zero() {
            return Err(UaError::configuration(ConfigurationError::invalid_value(
                "subscription.publishing_interval",
                "must be greater than 0",
            )));
        }
        // The protocol requires at least three keep-alives per lifetime.
        if self.lifetime_count < self.max_keep_alive_count.saturating_mul(3) {
            return Err(UaError::configuration(ConfigurationError::invalid_value(
                "subscription.lifetime_count",
                "must be at least three times max_keep_alive_count",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// MonitoringParameters
// =============================================================================

/// Delivery parameters of one monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringParameters {
    /// Sampling interval.
    #[serde(default = "default_sampling_interval", with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Discard the oldest entry when the queue overflows.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Monitoring mode.
    #[serde(default)]
    pub mode: MonitoringMode,
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_queue_size() -> u32 {
    1
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
            mode: MonitoringMode::Reporting,
        }
    }
}

impl MonitoringParameters {
    /// Creates parameters with a custom sampling interval.
    pub fn with_sampling_interval(interval: Duration) -> Self {
        Self {
            sampling_interval: interval,
            ..Default::default()
        }
    }

    /// Validates the parameters.
    pub fn validate(&self) -> UaResult<()> {
        if self.queue_size == 0 {
            return Err(UaError::configuration(ConfigurationError::invalid_value(
                "monitoring.queue_size",
                "must be greater than 0",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_application_uri(), "urn:uaview:UaViewClient");
    }

    #[test]
    fn test_builder_rejects_zero_poll_interval() {
        let result = ClientConfig::builder().poll_interval(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_subscription_lifetime_rule() {
        let params = SubscriptionParameters {
            lifetime_count: 20,
            max_keep_alive_count: 10,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(SubscriptionParameters::default().validate().is_ok());
    }

    #[test]
    fn test_serde_humantime() {
        let json = r#"{"poll_interval":"250ms","discovery_timeout":"2s"}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.discovery_timeout, Duration::from_secs(2));
        assert_eq!(config.application_name, "UaView Client");

        let out = serde_json::to_string(&config).unwrap();
        assert!(out.contains("\"250ms\""));
    }

    #[test]
    fn test_monitoring_defaults() {
        let params = MonitoringParameters::default();
        assert_eq!(params.mode, MonitoringMode::Reporting);
        assert!(params.discard_oldest);
        assert!(MonitoringParameters { queue_size: 0, ..params }.validate().is_err());
    }
}
