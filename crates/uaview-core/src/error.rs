// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the connection, node and subscription core.
//!
//! Errors are grouped by the stage of a session they come from, so callers
//! can tell a refused handshake from a rejected write without string
//! matching.
//!
//! # Error Categories
//!
//! ```text
//! UaError
//! ├── Connection    - Endpoint discovery, handshake, session state
//! ├── Security      - Credentials, certificates, security mode
//! ├── Browse        - Node lookup and reference traversal
//! ├── Operation     - Attribute read/write and method calls
//! ├── Subscription  - Subscription and monitored item lifecycle
//! ├── Conversion    - Variant to typed attribute conversion
//! ├── Configuration - Invalid client or builder settings
//! └── Timeout       - Operation deadlines
//! ```
//!
//! Not-applicable attributes and unknown nodes are *not* errors; they are
//! reported through [`crate::AttributeValue::NotApplicable`] and `Option`.
//!
//! # Examples
//!
//! ```
//! use uaview_core::error::{ConnectionError, UaError};
//!
//! let error = UaError::connection(ConnectionError::refused("opc.tcp://localhost:4840"));
//! assert!(error.is_retryable());
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::StatusCode;

// =============================================================================
// UaError - Main Error Type
// =============================================================================

/// The main error type for client operations.
#[derive(Debug, Error)]
pub enum UaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Security and authentication errors.
    #[error("{0}")]
    Security(#[from] SecurityError),

    /// Node lookup and browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read/write/call errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Data conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Timeout errors.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),
}

impl UaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a security error.
    #[inline]
    pub fn security(error: SecurityError) -> Self {
        Self::Security(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a connection closed error.
    pub fn closed() -> Self {
        Self::Connection(ConnectionError::Closed)
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    /// Creates a missing field configuration error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::missing_field(field))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a caller-driven retry may succeed.
    ///
    /// The core never retries on its own; this only classifies the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Security(_) => false,
            Self::Browse(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Subscription(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Security(_) => ErrorSeverity::Error,
            Self::Browse(_) => ErrorSeverity::Warning,
            Self::Operation(e) => e.severity(),
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Conversion(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Security(_) => "security",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Security(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Timeout(e) => e.error_code(),
        }
    }

    /// Returns the status code reported by the server, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Operation(OperationError::BadStatus { status, .. }) => Some(*status),
            Self::Subscription(SubscriptionError::BadStatus { status, .. }) => Some(*status),
            Self::Browse(BrowseError::BadStatus { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused by the server.
    #[error("Connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
    },

    /// Handshake or session activation failed.
    #[error("Handshake with '{endpoint}' failed: {message}")]
    HandshakeFailed {
        /// Target endpoint.
        endpoint: String,
        /// Failure description.
        message: String,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery failed for '{url}': {message}")]
    DiscoveryFailed {
        /// The discovery URL.
        url: String,
        /// Failure description.
        message: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// No endpoint matching the requested security settings.
    #[error("No suitable endpoint found with security mode '{security_mode}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
    },

    /// The connection is not established.
    #[error("Not connected to the server")]
    NotConnected,

    /// The connection has been closed and cannot be used again.
    #[error("Connection is closed")]
    Closed,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a handshake failed error.
    pub fn handshake_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a discovery failed error.
    pub fn discovery_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. }
                | Self::HandshakeFailed { .. }
                | Self::DiscoveryFailed { .. }
                | Self::NotConnected
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::HandshakeFailed { .. } => ErrorCode::new(1, 2),
            Self::DiscoveryFailed { .. } => ErrorCode::new(1, 3),
            Self::InvalidEndpoint { .. } => ErrorCode::new(1, 4),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(1, 5),
            Self::NotConnected => ErrorCode::new(1, 6),
            Self::Closed => ErrorCode::new(1, 7),
        }
    }
}

// =============================================================================
// SecurityError
// =============================================================================

/// Security and authentication errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Credentials were rejected.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Client certificate material is unusable.
    #[error("Certificate error: {message}")]
    Certificate {
        /// Error message.
        message: String,
    },

    /// The requested security mode cannot be applied.
    #[error("Security mode not supported: {mode}")]
    ModeNotSupported {
        /// The mode.
        mode: String,
    },
}

impl SecurityError {
    /// Creates an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates a certificate error.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }

    /// Creates a mode not supported error.
    pub fn mode_not_supported(mode: impl Into<String>) -> Self {
        Self::ModeNotSupported { mode: mode.into() }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationFailed { .. } => ErrorCode::new(2, 1),
            Self::Certificate { .. } => ErrorCode::new(2, 2),
            Self::ModeNotSupported { .. } => ErrorCode::new(2, 3),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Node lookup and browsing errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Browse request failed.
    #[error("Browse failed for '{node_id}': {message}")]
    Failed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server answered with a bad status.
    #[error("Browse of '{node_id}' returned {status}")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status reported by the server.
        status: StatusCode,
    },

    /// Node ID text could not be parsed.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// Node ID text.
        node_id: String,
        /// Reason.
        reason: String,
    },
}

impl BrowseError {
    /// Creates a browse failed error.
    pub fn failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status,
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Failed { .. } => ErrorCode::new(3, 1),
            Self::BadStatus { .. } => ErrorCode::new(3, 2),
            Self::InvalidNodeId { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Attribute read/write and method call errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read request failed.
    #[error("Read failed for '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Write request failed.
    #[error("Write failed for '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Method call failed.
    #[error("Call of '{method_id}' on '{object_id}' failed: {message}")]
    CallFailed {
        /// Object the method was invoked on.
        object_id: String,
        /// Method node.
        method_id: String,
        /// Error message.
        message: String,
    },

    /// The server answered with a bad status.
    #[error("Operation on '{node_id}' returned {status}")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status reported by the server.
        status: StatusCode,
    },

    /// The attribute or operation does not exist for the node class.
    #[error("'{operation}' is not applicable to {node_class} node '{node_id}'")]
    NotApplicable {
        /// Node ID.
        node_id: String,
        /// Node class name.
        node_class: String,
        /// The attempted operation.
        operation: String,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a call failed error.
    pub fn call_failed(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CallFailed {
            object_id: object_id.into(),
            method_id: method_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status,
        }
    }

    /// Creates a not applicable error.
    pub fn not_applicable(
        node_id: impl Into<String>,
        node_class: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::NotApplicable {
            node_id: node_id.into(),
            node_class: node_class.into(),
            operation: operation.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReadFailed { .. } | Self::WriteFailed { .. } | Self::CallFailed { .. } => true,
            Self::BadStatus { status, .. } => status.is_transient(),
            Self::NotApplicable { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotApplicable { .. } => ErrorSeverity::Info,
            Self::BadStatus { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadFailed { .. } => ErrorCode::new(4, 1),
            Self::WriteFailed { .. } => ErrorCode::new(4, 2),
            Self::CallFailed { .. } => ErrorCode::new(4, 3),
            Self::BadStatus { .. } => ErrorCode::new(4, 4),
            Self::NotApplicable { .. } => ErrorCode::new(4, 5),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// Subscription modification failed.
    #[error("Failed to modify subscription {subscription_id}: {message}")]
    ModifyFailed {
        /// Subscription ID.
        subscription_id: u32,
        /// Error message.
        message: String,
    },

    /// Subscription deletion failed.
    #[error("Failed to delete subscription {subscription_id}: {message}")]
    DeleteFailed {
        /// Subscription ID.
        subscription_id: u32,
        /// Error message.
        message: String,
    },

    /// Subscription not found on the server.
    #[error("Subscription not found: {subscription_id}")]
    NotFound {
        /// Subscription ID.
        subscription_id: u32,
    },

    /// Monitored item creation failed.
    #[error("Failed to monitor '{node_id}': {message}")]
    MonitoredItemFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server answered with a bad status.
    #[error("Monitored item for '{node_id}' rejected with {status}")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status reported by the server.
        status: StatusCode,
    },
}

impl SubscriptionError {
    /// Creates a subscription creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a modify failed error.
    pub fn modify_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::ModifyFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Creates a delete failed error.
    pub fn delete_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// Creates a monitored item failed error.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed { .. } | Self::ModifyFailed { .. } | Self::MonitoredItemFailed { .. }
        )
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreationFailed { .. } => ErrorCode::new(5, 1),
            Self::ModifyFailed { .. } => ErrorCode::new(5, 2),
            Self::DeleteFailed { .. } => ErrorCode::new(5, 3),
            Self::NotFound { .. } => ErrorCode::new(5, 4),
            Self::MonitoredItemFailed { .. } => ErrorCode::new(5, 5),
            Self::BadStatus { .. } => ErrorCode::new(5, 6),
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Variant conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Value had an unexpected type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// Array elements are not of a single kind.
    #[error("Array is not homogeneous: expected {expected}, found {found}")]
    MixedArray {
        /// Kind of the first element.
        expected: String,
        /// Offending kind.
        found: String,
    },

    /// Nested arrays are not representable.
    #[error("Nested arrays are not supported")]
    NestedArray,
}

impl ConversionError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::TypeMismatch { .. } => ErrorCode::new(6, 1),
            Self::MixedArray { .. } => ErrorCode::new(6, 2),
            Self::NestedArray => ErrorCode::new(6, 3),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required field was not provided.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field value is invalid.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(7, 1),
            Self::InvalidValue { .. } => ErrorCode::new(7, 2),
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Operation deadline errors.
#[derive(Debug, Error)]
#[error("{operation} timed out after {duration:?}")]
pub struct TimeoutError {
    /// The operation that timed out.
    pub operation: String,
    /// The deadline that elapsed.
    pub duration: Duration,
}

impl TimeoutError {
    /// Creates a timeout error.
    pub fn new(operation: impl Into<String>, duration: Duration) -> Self {
        Self {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::new(8, 1)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::DEBUG,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Stable error code, rendered as `UA-CCNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-8).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with UaError.
pub type UaResult<T> = Result<T, UaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_retryable() {
        assert!(ConnectionError::refused("opc.tcp://localhost:4840").is_retryable());
        assert!(ConnectionError::NotConnected.is_retryable());
        assert!(!ConnectionError::Closed.is_retryable());
        assert!(!ConnectionError::invalid_endpoint("bad-url", "no scheme").is_retryable());
    }

    #[test]
    fn test_security_error_not_retryable() {
        let error = UaError::security(SecurityError::authentication_failed("bad password"));
        assert!(!error.is_retryable());
        assert_eq!(error.category(), "security");
    }

    #[test]
    fn test_operation_bad_status() {
        let error = UaError::operation(OperationError::bad_status(
            "ns=2;i=1",
            StatusCode::BAD_NOT_WRITABLE,
        ));
        assert_eq!(error.status_code(), Some(StatusCode::BAD_NOT_WRITABLE));
        assert!(error.to_string().contains("BadNotWritable"));
    }

    #[test]
    fn test_not_applicable_is_info() {
        let error = OperationError::not_applicable("i=84", "Object", "set_value");
        assert_eq!(error.severity(), ErrorSeverity::Info);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_code_display() {
        let code = ErrorCode::new(1, 5);
        assert_eq!(code.to_string(), "UA-0105");
        assert_eq!(code.as_u16(), 0x0105);

        let error = UaError::missing_field("endpoint");
        assert_eq!(error.error_code().to_string(), "UA-0701");
    }

    #[test]
    fn test_timeout_error() {
        let error = UaError::timeout(TimeoutError::new("discovery", Duration::from_secs(5)));
        assert!(error.is_retryable());
        assert!(error.to_string().contains("discovery"));
    }
}
