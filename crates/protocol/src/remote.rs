//! Envelope for the remote control broadcast channel.
//!
//! Controllers send `{cmd, payload?}` objects over the WebSocket hub; the hub
//! re-broadcasts them verbatim to every connected peer, so the same type
//! describes both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single control message on the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
	/// Command name, e.g. `nav:ok`, `ptr:move`, `play:toggle`.
	pub cmd: String,
	/// Optional command payload (pointer deltas, a URL to open, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
}

impl RemoteMessage {
	pub fn new(cmd: impl Into<String>) -> Self {
		Self { cmd: cmd.into(), payload: None }
	}

	pub fn with_payload(cmd: impl Into<String>, payload: Value) -> Self {
		Self { cmd: cmd.into(), payload: Some(payload) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bare_command_omits_payload() {
		let msg = RemoteMessage::new("nav:ok");
		assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"cmd":"nav:ok"}"#);
	}

	#[test]
	fn payload_round_trip() {
		let raw = r#"{"cmd":"ptr:move","payload":{"dx":10,"dy":-5}}"#;
		let msg: RemoteMessage = serde_json::from_str(raw).unwrap();
		assert_eq!(msg.cmd, "ptr:move");
		assert_eq!(msg.payload.unwrap()["dx"], 10);
	}
}
