//! JSON hub protocol framing.
//!
//! Every frame is a JSON object followed by the record separator `0x1E`. A
//! connection opens with a handshake request answered by `{}` (or an
//! `error`), after which messages are distinguished by a numeric `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HubError;

/// Frame terminator.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Message type codes.
pub mod message_type {
    pub const INVOCATION: u8 = 1;
    pub const STREAM_ITEM: u8 = 2;
    pub const COMPLETION: u8 = 3;
    pub const PING: u8 = 6;
    pub const CLOSE: u8 = 7;
}

#[derive(Serialize)]
struct HandshakeRequest<'a> {
    protocol: &'a str,
    version: u32,
}

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// A decoded hub message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server-to-client method call, or a client-to-server call when built
    /// locally.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Result of a client invocation.
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    /// The server is closing the connection.
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// A message type this client does not handle.
    Other(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingInvocation<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation_id: Option<&'a str>,
    target: &'a str,
    arguments: &'a [Value],
}

#[derive(Serialize)]
struct OutgoingPing {
    #[serde(rename = "type")]
    kind: u8,
}

/// Handshake request frame.
///
/// # Errors
///
/// Returns `HubError::Protocol` if serialization fails.
pub fn handshake_request() -> Result<String, HubError> {
    let json = serde_json::to_string(&HandshakeRequest {
        protocol: "json",
        version: 1,
    })?;
    Ok(format!("{json}{RECORD_SEPARATOR}"))
}

/// Check the handshake response and return any frames that arrived in the
/// same transport message.
///
/// # Errors
///
/// Returns `HubError::Handshake` if the server rejected the handshake, or
/// `HubError::Protocol` if the response is malformed.
pub fn parse_handshake(text: &str) -> Result<&str, HubError> {
    let Some((first, rest)) = text.split_once(RECORD_SEPARATOR) else {
        return Err(HubError::Protocol("unterminated handshake response".to_string()));
    };
    let response: HandshakeResponse = serde_json::from_str(first)?;
    match response.error {
        Some(error) => Err(HubError::Handshake(error)),
        None => Ok(rest),
    }
}

/// Split a transport message into frames and decode each one.
///
/// # Errors
///
/// Returns `HubError::Protocol` on the first frame that is not valid JSON or
/// lacks a required field.
pub fn parse_messages(text: &str) -> Result<Vec<HubMessage>, HubError> {
    text.split(RECORD_SEPARATOR)
        .filter(|frame| !frame.trim().is_empty())
        .map(parse_message)
        .collect()
}

fn parse_message(frame: &str) -> Result<HubMessage, HubError> {
    let raw: RawMessage = serde_json::from_str(frame)?;
    let message = match raw.kind {
        message_type::INVOCATION => HubMessage::Invocation {
            invocation_id: raw.invocation_id,
            target: raw
                .target
                .ok_or_else(|| HubError::Protocol("invocation without target".to_string()))?,
            arguments: raw.arguments,
        },
        message_type::COMPLETION => HubMessage::Completion {
            invocation_id: raw.invocation_id.ok_or_else(|| {
                HubError::Protocol("completion without invocationId".to_string())
            })?,
            result: raw.result,
            error: raw.error,
        },
        message_type::PING => HubMessage::Ping,
        message_type::CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(false),
        },
        other => HubMessage::Other(other),
    };
    Ok(message)
}

/// Encode a client invocation. `invocation_id` is `None` for fire-and-forget
/// calls.
///
/// # Errors
///
/// Returns `HubError::Protocol` if an argument cannot be serialized.
pub fn encode_invocation(
    invocation_id: Option<&str>,
    target: &str,
    arguments: &[Value],
) -> Result<String, HubError> {
    let json = serde_json::to_string(&OutgoingInvocation {
        kind: message_type::INVOCATION,
        invocation_id,
        target,
        arguments,
    })?;
    Ok(format!("{json}{RECORD_SEPARATOR}"))
}

/// Encode a ping frame.
///
/// # Errors
///
/// Returns `HubError::Protocol` if serialization fails.
pub fn encode_ping() -> Result<String, HubError> {
    let json = serde_json::to_string(&OutgoingPing {
        kind: message_type::PING,
    })?;
    Ok(format!("{json}{RECORD_SEPARATOR}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_handshake_request_is_terminated() {
        let frame = handshake_request().unwrap();
        assert_eq!(frame, "{\"protocol\":\"json\",\"version\":1}\u{1e}");
    }

    #[test]
    fn test_handshake_ok_returns_trailing_frames() {
        let rest = parse_handshake("{}\u{1e}{\"type\":6}\u{1e}").unwrap();
        assert_eq!(parse_messages(rest).unwrap(), vec![HubMessage::Ping]);
    }

    #[test]
    fn test_handshake_error() {
        let err = parse_handshake("{\"error\":\"unsupported\"}\u{1e}").unwrap_err();
        assert!(matches!(err, HubError::Handshake(msg) if msg == "unsupported"));
        assert!(parse_handshake("{}").is_err());
    }

    #[test]
    fn test_parse_batch() {
        let text = concat!(
            "{\"type\":1,\"target\":\"OrderStatusUpdated\",\"arguments\":[{\"orderId\":\"o1\"}]}\u{1e}",
            "{\"type\":3,\"invocationId\":\"7\",\"result\":null}\u{1e}",
            "{\"type\":7,\"error\":\"bye\",\"allowReconnect\":true}\u{1e}",
            "{\"type\":4,\"invocationId\":\"x\"}\u{1e}",
        );
        let messages = parse_messages(text).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(
            &messages[0],
            HubMessage::Invocation { target, arguments, .. }
                if target == "OrderStatusUpdated" && arguments[0]["orderId"] == "o1"
        ));
        assert!(matches!(
            &messages[1],
            HubMessage::Completion { invocation_id, error: None, .. } if invocation_id == "7"
        ));
        assert_eq!(messages[2], HubMessage::Close {
            error: Some("bye".to_string()),
            allow_reconnect: true,
        });
        assert_eq!(messages[3], HubMessage::Other(4));
    }

    #[test]
    fn test_invocation_without_target_is_rejected() {
        assert!(parse_messages("{\"type\":1,\"arguments\":[]}\u{1e}").is_err());
    }

    #[test]
    fn test_encode_invocation() {
        let frame = encode_invocation(Some("1"), "SubscribeToOrder", &[json!("o1")]).unwrap();
        let body: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body, json!({
            "type": 1,
            "invocationId": "1",
            "target": "SubscribeToOrder",
            "arguments": ["o1"],
        }));
    }
}
