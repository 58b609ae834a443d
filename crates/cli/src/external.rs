//! Opens a URL in the platform's unmanaged default browser.
//!
//! The last-resort playback path: when the DRM engine cannot carry a
//! session, playback degrades to the system browser rather than failing.

use std::process::Command;

/// Hands `url` to the platform opener, best-effort. Only web URLs are
/// forwarded; anything else is dropped with a warning.
pub fn open_external(url: &str) {
	match url::Url::parse(url) {
		Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
		_ => {
			tracing::warn!(url, "refusing to open non-web URL externally");
			return;
		}
	}

	let result = spawn_opener(url);
	match result {
		Ok(_child) => tracing::info!(url, "opened in external browser"),
		Err(err) => tracing::warn!(url, error = %err, "external browser launch failed"),
	}
}

#[cfg(target_os = "macos")]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
	Command::new("open").arg(url).spawn()
}

#[cfg(target_os = "windows")]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
	Command::new("cmd").args(["/C", "start", "", url]).spawn()
}

#[cfg(all(unix, not(target_os = "macos")))]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
	Command::new("xdg-open").arg(url).spawn()
}
