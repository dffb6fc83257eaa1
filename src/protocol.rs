//! Wire message types for the bootstrap calls.
//!
//! This module defines the JSON shapes exchanged with the remote debugging
//! endpoint. Only the handful of messages needed to classify the remote are
//! modelled; the full protocol surface belongs to the session layer above.
//!
//! # Message Format
//!
//! Outbound:
//!
//! ```json
//! { "id": 1, "method": "Browser.getVersion", "params": {} }
//! ```
//!
//! Inbound, correlated by `id`:
//!
//! ```json
//! { "id": 1, "result": { "product": "HeadlessChrome/115.0" } }
//! { "id": 2, "error": { "code": -32601, "message": "unknown method" } }
//! ```
//!
//! Inbound frames without an `id` are protocol events; this layer traces
//! and drops them.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Method Names
// ============================================================================

/// Version-query call used to classify the remote product.
pub const BROWSER_GET_VERSION: &str = "Browser.getVersion";

/// Enumeration of isolated browsing contexts known at connect time.
pub const TARGET_GET_BROWSER_CONTEXTS: &str = "Target.getBrowserContexts";

/// Advisory remote shutdown notification.
pub const BROWSER_CLOSE: &str = "Browser.close";

// ============================================================================
// CallMessage
// ============================================================================

/// An outbound protocol call.
#[derive(Debug, Serialize)]
pub(crate) struct CallMessage<'a> {
    /// Correlation id, unique per connection.
    pub id: u64,

    /// Method in `Domain.method` form.
    pub method: &'a str,

    /// Call parameters; omitted when null.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: &'a Value,
}

// ============================================================================
// InboundMessage
// ============================================================================

/// Any frame received from the remote.
///
/// A frame carrying an `id` is a response to one of our calls; a frame
/// without one is an event addressed to the session layer.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundMessage {
    /// Correlation id (absent on events).
    pub id: Option<u64>,

    /// Result payload (success responses).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (error responses).
    #[serde(default)]
    pub error: Option<RemoteError>,

    /// Event method name (events only).
    #[serde(default)]
    pub method: Option<String>,
}

// ============================================================================
// RemoteError
// ============================================================================

/// Error payload of an error response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
    /// Numeric error code, when the remote provides one.
    #[serde(default)]
    pub code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// VersionInfo
// ============================================================================

/// Result of [`BROWSER_GET_VERSION`].
///
/// Remote agents report free-form strings here; every field defaults to
/// empty rather than failing deserialization, since classification only
/// needs `product`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionInfo {
    /// Product name and version, e.g. `HeadlessChrome/115.0.5790.24`.
    #[serde(default)]
    pub product: String,

    /// Protocol version the remote speaks.
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: String,

    /// Build revision.
    #[serde(default)]
    pub revision: String,

    /// User agent the remote would present.
    #[serde(default, rename = "userAgent")]
    pub user_agent: String,

    /// JavaScript engine version.
    #[serde(default, rename = "jsVersion")]
    pub js_version: String,
}

// ============================================================================
// BrowserContexts
// ============================================================================

/// Result of [`TARGET_GET_BROWSER_CONTEXTS`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserContexts {
    /// Identifiers of the isolated browsing contexts reported by the remote.
    #[serde(default, rename = "browserContextIds")]
    pub browser_context_ids: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_call_message_serialization() {
        let params = json!({ "discover": true });
        let call = CallMessage {
            id: 7,
            method: BROWSER_GET_VERSION,
            params: &params,
        };

        let rendered = serde_json::to_string(&call).expect("serialize");
        assert!(rendered.contains("\"id\":7"));
        assert!(rendered.contains("Browser.getVersion"));
        assert!(rendered.contains("\"discover\":true"));
    }

    #[test]
    fn test_null_params_omitted() {
        let params = Value::Null;
        let call = CallMessage {
            id: 1,
            method: BROWSER_CLOSE,
            params: &params,
        };

        let rendered = serde_json::to_string(&call).expect("serialize");
        assert!(!rendered.contains("params"));
    }

    #[test]
    fn test_success_response_parsing() {
        let raw = r#"{ "id": 3, "result": { "product": "Firefox/115.0" } }"#;
        let message: InboundMessage = serde_json::from_str(raw).expect("parse");

        assert_eq!(message.id, Some(3));
        assert!(message.error.is_none());
        let result = message.result.expect("result present");
        assert_eq!(result["product"], "Firefox/115.0");
    }

    #[test]
    fn test_error_response_parsing() {
        let raw = r#"{ "id": 4, "error": { "code": -32601, "message": "unknown method" } }"#;
        let message: InboundMessage = serde_json::from_str(raw).expect("parse");

        assert_eq!(message.id, Some(4));
        let error = message.error.expect("error present");
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "unknown method");
    }

    #[test]
    fn test_event_frame_has_no_id() {
        let raw = r#"{ "method": "Target.targetCreated", "params": {} }"#;
        let message: InboundMessage = serde_json::from_str(raw).expect("parse");

        assert_eq!(message.id, None);
        assert_eq!(message.method.as_deref(), Some("Target.targetCreated"));
    }

    #[test]
    fn test_version_info_tolerates_missing_fields() {
        let info: VersionInfo =
            serde_json::from_value(json!({ "product": "HeadlessChrome/115.0" })).expect("parse");
        assert_eq!(info.product, "HeadlessChrome/115.0");
        assert!(info.protocol_version.is_empty());
        assert!(info.user_agent.is_empty());
    }

    #[test]
    fn test_version_info_full() {
        let info: VersionInfo = serde_json::from_value(json!({
            "product": "Chrome/115.0.5790.24",
            "protocolVersion": "1.3",
            "revision": "@abcdef",
            "userAgent": "Mozilla/5.0",
            "jsVersion": "11.5"
        }))
        .expect("parse");
        assert_eq!(info.protocol_version, "1.3");
        assert_eq!(info.js_version, "11.5");
    }

    #[test]
    fn test_browser_contexts_parsing() {
        let contexts: BrowserContexts = serde_json::from_value(json!({
            "browserContextIds": ["ctx-1", "ctx-2"]
        }))
        .expect("parse");
        assert_eq!(contexts.browser_context_ids, vec!["ctx-1", "ctx-2"]);

        let empty: BrowserContexts = serde_json::from_value(json!({})).expect("parse");
        assert!(empty.browser_context_ids.is_empty());
    }
}
