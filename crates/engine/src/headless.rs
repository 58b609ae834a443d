//! Diagnostic view backend.
//!
//! Stands in for the platform webview on builds that have none: it keeps a
//! real history stack and emits the same events a navigation would, but
//! renders nothing. Integration tests drive the full pipe dispatch path
//! against it.

use serde_json::Value;
use settop_protocol::NavCmd;

use crate::view::{EngineView, ViewError, ViewEvents, ViewRequest};

#[derive(Default)]
pub struct HeadlessView {
	history: Vec<String>,
	index: usize,
	events: Option<ViewEvents>,
}

impl HeadlessView {
	pub fn new() -> Self {
		Self::default()
	}

	fn navigate(&mut self, url: String) {
		// A new navigation truncates any forward history.
		self.history.truncate(self.index.saturating_add(1).min(self.history.len()));
		self.history.push(url.clone());
		self.index = self.history.len() - 1;
		if let Some(events) = &self.events {
			events.navigated(url);
		}
	}

	fn current(&self) -> Option<&str> {
		self.history.get(self.index).map(String::as_str)
	}
}

impl EngineView for HeadlessView {
	fn open(&mut self, request: ViewRequest, events: ViewEvents) -> Result<(), ViewError> {
		tracing::info!(
			url = %request.url,
			partition = %request.partition_dir.display(),
			fullscreen = request.fullscreen,
			"headless view bound (no embedded browser engine on this build)"
		);
		if let Some(ua) = &request.user_agent {
			tracing::debug!(user_agent = %ua, "user-agent override applied");
		}
		self.events = Some(events);
		self.navigate(request.url);
		Ok(())
	}

	fn history(&mut self, cmd: NavCmd) {
		match cmd {
			NavCmd::Back if self.index > 0 => {
				self.index -= 1;
				if let (Some(events), Some(url)) = (self.events.clone(), self.current()) {
					events.navigated(url);
				}
			}
			NavCmd::Forward if self.index + 1 < self.history.len() => {
				self.index += 1;
				if let (Some(events), Some(url)) = (self.events.clone(), self.current()) {
					events.navigated(url);
				}
			}
			NavCmd::Reload => {
				if let (Some(events), Some(url)) = (self.events.clone(), self.current()) {
					events.navigated(url);
				}
			}
			// back/forward with no corresponding history entry
			_ => {}
		}
	}

	fn exec(&mut self, code: &str) -> Result<(), ViewError> {
		if self.current().is_none() {
			return Err(ViewError::Script("no page loaded".to_string()));
		}
		tracing::debug!(bytes = code.len(), "script discarded by headless view");
		Ok(())
	}

	fn post_message(&mut self, payload: &Value) -> Result<(), ViewError> {
		if self.current().is_none() {
			return Err(ViewError::Post("no page loaded".to_string()));
		}
		tracing::debug!(%payload, "message discarded by headless view");
		Ok(())
	}

	fn set_bounds(&mut self, x: i32, y: i32, width: u32, height: u32) {
		tracing::debug!(x, y, width, height, "bounds ignored by headless view");
	}

	fn close(&mut self) {
		tracing::info!("headless view closed");
		self.events = None;
	}
}

#[cfg(test)]
mod tests {
	use settop_protocol::Event;
	use tokio::sync::mpsc;

	use super::*;

	fn bound_view() -> (HeadlessView, mpsc::UnboundedReceiver<Event>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut view = HeadlessView::new();
		view.open(
			ViewRequest {
				url: "https://a.example".to_string(),
				partition_dir: std::env::temp_dir(),
				user_agent: None,
				fullscreen: false,
				display: None,
			},
			ViewEvents::new(tx),
		)
		.unwrap();
		(view, rx)
	}

	fn navigated_url(rx: &mut mpsc::UnboundedReceiver<Event>) -> String {
		match rx.try_recv().expect("event expected") {
			Event::Navigated { url } => url,
			other => panic!("expected navigated, got {other:?}"),
		}
	}

	#[test]
	fn back_without_history_is_a_no_op() {
		let (mut view, mut rx) = bound_view();
		assert_eq!(navigated_url(&mut rx), "https://a.example");

		view.history(NavCmd::Back);
		view.history(NavCmd::Forward);
		assert!(rx.try_recv().is_err(), "no history entries, no events");
	}

	#[test]
	fn back_and_forward_walk_the_stack() {
		let (mut view, mut rx) = bound_view();
		navigated_url(&mut rx);
		view.navigate("https://b.example".to_string());
		navigated_url(&mut rx);

		view.history(NavCmd::Back);
		assert_eq!(navigated_url(&mut rx), "https://a.example");
		view.history(NavCmd::Forward);
		assert_eq!(navigated_url(&mut rx), "https://b.example");
		view.history(NavCmd::Reload);
		assert_eq!(navigated_url(&mut rx), "https://b.example");
	}

	#[test]
	fn exec_requires_a_page() {
		let mut view = HeadlessView::new();
		assert!(view.exec("1 + 1").is_err());

		let (mut view, _rx) = bound_view();
		assert!(view.exec("1 + 1").is_ok());
	}
}
