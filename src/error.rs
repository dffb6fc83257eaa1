//! Error types for the connection bootstrap layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_connect::{connect, ConnectOptions, Result};
//!
//! async fn example() -> Result<()> {
//!     let options = ConnectOptions::discovery_url("http://127.0.0.1:9222");
//!     let browser = connect(options).await?;
//!     browser.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::InvalidConnectOptions`] |
//! | Handshake | [`Error::Handshake`] |
//! | Discovery | [`Error::Discovery`] |
//! | Bootstrap | [`Error::CommandFailed`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::Protocol`] |
//! | External | [`Error::Json`] |
//!
//! Socket errors that occur after the handshake completed are not part of
//! this taxonomy on purpose: they are observed (logged, and reported to the
//! optional transport error observer) but never raised to a caller. The
//! close event that follows is the caller's signal that the channel is gone.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes enough context to tell a misconfigured endpoint
/// from an unreachable host from an incompatible remote, without inspecting
/// internal state.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid combination of connect options.
    ///
    /// Returned when zero or more than one connection strategy was supplied.
    /// Fatal, surfaced before any I/O, never retried.
    #[error("Invalid connect options: {message}")]
    InvalidConnectOptions {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// WebSocket handshake failed.
    ///
    /// Returned when the socket never reached the open state. Terminal for
    /// that transport; there is no automatic retry or strategy fallback.
    #[error("WebSocket handshake failed for {endpoint}: {message}")]
    Handshake {
        /// Endpoint URL the handshake was attempted against.
        endpoint: String,
        /// Underlying socket error.
        message: String,
    },

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// Endpoint discovery failed.
    ///
    /// Returned when the discovery HTTP call failed, returned a non-success
    /// status, or its body could not be parsed. The message always names the
    /// discovery URL attempted.
    #[error("Failed to fetch browser WebSocket URL from {url}: {message}")]
    Discovery {
        /// Discovery URL that was attempted.
        url: String,
        /// Description of the failure (HTTP status, network or parse error).
        message: String,
    },

    // ========================================================================
    // Bootstrap Errors
    // ========================================================================
    /// The remote answered a protocol call with an error response.
    ///
    /// Surfaced as-is; the connection is left open and cleanup is the
    /// caller's responsibility.
    #[error("Command {method} failed: {message}")]
    CommandFailed {
        /// Protocol method that failed.
        method: String,
        /// Error message reported by the remote.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection closed while a call was pending, or used after close.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol violation attributable to the remote.
    ///
    /// Returned when the remote sends traffic this layer cannot make sense
    /// of during bootstrap.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid connect options error.
    #[inline]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidConnectOptions {
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handshake {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a command failed error.
    #[inline]
    pub fn command_failed(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error means the channel never existed or is gone.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Handshake { .. } | Self::ConnectionClosed)
    }

    /// Returns `true` if this is a caller configuration error.
    ///
    /// Configuration errors are surfaced before any I/O happens.
    #[inline]
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidConnectOptions { .. })
    }

    /// Returns `true` if this error originated from endpoint discovery.
    #[inline]
    #[must_use]
    pub fn is_discovery_error(&self) -> bool {
        matches!(self, Self::Discovery { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
