//! Command/event vocabulary for the engine pipe.
//!
//! Commands flow host -> engine, events flow engine -> host. Envelopes are
//! tagged with a `type` field and carry no correlation IDs: ordering on the
//! wire is the only ordering guarantee, so both sides treat the stream as
//! strictly sequential.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent from the shell to the engine process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
	/// Start or replace the playback session.
	Open(OpenParams),
	/// History navigation inside the engine's loaded page.
	Nav { cmd: NavCmd },
	/// Run a script in the loaded page context.
	Exec { code: String },
	/// Post a structured message into the loaded page.
	PostMessage { payload: Value },
	/// Reposition/resize the engine window.
	SetBounds { x: i32, y: i32, width: u32, height: u32 },
	/// Close the engine window gracefully.
	Close,
}

/// Fields of the `open` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenParams {
	/// Service key, e.g. `netflix`.
	pub service: String,
	/// Storage partition key; defaults to the service key when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_key: Option<String>,
	/// Target URL to navigate to once the view is bound.
	pub url: String,
	/// Display the window should be restricted to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display: Option<String>,
	/// Borderless-maximized presentation on the addressed display.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fullscreen: Option<bool>,
	/// Optional user-agent override for the embedded view.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_agent: Option<String>,
}

impl OpenParams {
	/// The storage partition key for this session (`sessionKey` falling back
	/// to `service`).
	pub fn partition_key(&self) -> &str {
		self.session_key.as_deref().unwrap_or(&self.service)
	}

	/// Whether fullscreen presentation was requested.
	pub fn wants_fullscreen(&self) -> bool {
		self.fullscreen.unwrap_or(false)
	}
}

/// History navigation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavCmd {
	Back,
	Forward,
	Reload,
}

/// Event sent from the engine process back to the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
	/// Pipe connected and the peer finished initializing. Emitted exactly
	/// once per connection.
	Ready,
	/// A navigation completed inside the engine view.
	Navigated { url: String },
	/// The loaded page posted a message out (player telemetry and similar).
	MediaStateChanged { payload: Value },
	/// Recoverable engine-side fault, tagged with the stage it occurred in.
	Error { message: String, code: ErrorCode },
}

/// Stage code attached to `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCode {
	/// A structurally valid JSON line that is not a known command.
	Parser,
	/// Pipe-level read/write fault.
	Pipe,
	/// Engine-side initialization fault after connect.
	Startup,
	/// Session open failed (partition, view binding, user agent).
	Open,
	/// Navigation failed.
	Nav,
	/// Script execution failed.
	Exec,
	/// Message post failed.
	Post,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::Parser => "PARSER",
			ErrorCode::Pipe => "PIPE",
			ErrorCode::Startup => "STARTUP",
			ErrorCode::Open => "OPEN",
			ErrorCode::Nav => "NAV",
			ErrorCode::Exec => "EXEC",
			ErrorCode::Post => "POST",
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_command_wire_shape() {
		let cmd = Command::Open(OpenParams {
			service: "netflix".to_string(),
			session_key: Some("netflix".to_string()),
			url: "https://www.netflix.com/browse".to_string(),
			display: Some("primary".to_string()),
			fullscreen: Some(true),
			user_agent: None,
		});

		let value = serde_json::to_value(&cmd).unwrap();
		assert_eq!(value["type"], "open");
		assert_eq!(value["service"], "netflix");
		assert_eq!(value["sessionKey"], "netflix");
		assert_eq!(value["fullscreen"], true);
		// Absent optionals must not appear on the wire.
		assert!(value.get("userAgent").is_none());
	}

	#[test]
	fn close_command_is_bare_tag() {
		let value = serde_json::to_value(&Command::Close).unwrap();
		assert_eq!(value, serde_json::json!({"type": "close"}));
	}

	#[test]
	fn nav_command_round_trip() {
		let cmd: Command = serde_json::from_str(r#"{"type":"nav","cmd":"back"}"#).unwrap();
		assert_eq!(cmd, Command::Nav { cmd: NavCmd::Back });
	}

	#[test]
	fn partition_key_defaults_to_service() {
		let open: OpenParams =
			serde_json::from_str(r#"{"service":"disney","url":"https://www.disneyplus.com"}"#)
				.unwrap();
		assert_eq!(open.partition_key(), "disney");
		assert!(!open.wants_fullscreen());
	}

	#[test]
	fn event_deserialization() {
		let event: Event =
			serde_json::from_str(r#"{"type":"navigated","url":"https://example.com"}"#).unwrap();
		assert_eq!(event, Event::Navigated { url: "https://example.com".to_string() });

		let event: Event =
			serde_json::from_str(r#"{"type":"error","message":"boom","code":"EXEC"}"#).unwrap();
		match event {
			Event::Error { code, .. } => assert_eq!(code, ErrorCode::Exec),
			other => panic!("expected error event, got {other:?}"),
		}
	}

	#[test]
	fn unknown_type_is_rejected() {
		assert!(serde_json::from_str::<Command>(r#"{"type":"reboot"}"#).is_err());
		assert!(serde_json::from_str::<Event>(r#"{"type":"telemetry"}"#).is_err());
	}
}
