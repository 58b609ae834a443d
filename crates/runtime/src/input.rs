//! Input injection: abstract remote gestures rendered as `exec` commands.
//!
//! The injected script bodies are fully self-contained - they run inside an
//! arbitrary third-party page, so they cannot assume any helper script is
//! present. Cursor position and container bounds are bookkeeping local to
//! the injector; only the resulting script crosses the wire.
//!
//! Callers translating controller gestures flip the vertical delta before
//! calling [`InputInjector::pointer_move`] (natural trackpad semantics: a
//! swipe up moves the cursor up).

use settop_protocol::Command;

/// Default pointer sensitivity applied to incoming deltas.
const DEFAULT_SENSITIVITY: f64 = 1.2;

/// Id of the visual cursor element created inside the target page.
const CURSOR_ID: &str = "__settop_cursor";

/// Container size in pixels; the cursor is clamped to this box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
	pub width: f64,
	pub height: f64,
}

impl Default for Bounds {
	fn default() -> Self {
		Self { width: 1920.0, height: 1080.0 }
	}
}

/// Cursor position in container-pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
	pub x: f64,
	pub y: f64,
}

/// Directional pad keys plus OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpadKey {
	Up,
	Down,
	Left,
	Right,
	Ok,
}

impl DpadKey {
	fn js_key(self) -> &'static str {
		match self {
			DpadKey::Up => "ArrowUp",
			DpadKey::Down => "ArrowDown",
			DpadKey::Left => "ArrowLeft",
			DpadKey::Right => "ArrowRight",
			DpadKey::Ok => "Enter",
		}
	}
}

/// Translates pointer, scroll, and key gestures into `exec` commands.
pub struct InputInjector {
	cursor: CursorState,
	bounds: Bounds,
	sensitivity: f64,
}

impl InputInjector {
	/// Injector with the cursor centered in `bounds`.
	pub fn new(bounds: Bounds) -> Self {
		Self {
			cursor: CursorState { x: bounds.width / 2.0, y: bounds.height / 2.0 },
			bounds,
			sensitivity: DEFAULT_SENSITIVITY,
		}
	}

	pub fn cursor(&self) -> CursorState {
		self.cursor
	}

	/// Moves the cursor to an absolute position (clamped).
	pub fn set_cursor(&mut self, x: f64, y: f64) {
		self.cursor.x = x.clamp(0.0, self.bounds.width);
		self.cursor.y = y.clamp(0.0, self.bounds.height);
	}

	/// Updates the container size, e.g. after a display change. The cursor
	/// is re-clamped into the new box.
	pub fn set_bounds(&mut self, bounds: Bounds) {
		self.bounds = bounds;
		self.set_cursor(self.cursor.x, self.cursor.y);
	}

	/// Accumulates a pointer delta (scaled by sensitivity, clamped to the
	/// container) and returns the script moving the synthetic cursor there.
	///
	/// The script creates a small cursor overlay once and reuses it, then
	/// dispatches a `mousemove` at the clamped point so hover handlers fire.
	pub fn pointer_move(&mut self, dx: f64, dy: f64) -> Command {
		self.set_cursor(
			self.cursor.x + dx * self.sensitivity,
			self.cursor.y + dy * self.sensitivity,
		);
		let CursorState { x, y } = self.cursor;
		Command::Exec {
			code: format!(
				"(() => {{\n\
				\tlet c = document.getElementById('{CURSOR_ID}');\n\
				\tif (!c) {{\n\
				\t\tc = document.createElement('div');\n\
				\t\tc.id = '{CURSOR_ID}';\n\
				\t\tc.style.cssText = 'position:fixed;width:18px;height:18px;margin:-9px 0 0 -9px;border-radius:50%;background:rgba(255,255,255,0.85);border:2px solid rgba(0,0,0,0.35);z-index:2147483647;pointer-events:none;';\n\
				\t\tdocument.documentElement.appendChild(c);\n\
				\t}}\n\
				\tc.style.left = '{x}px';\n\
				\tc.style.top = '{y}px';\n\
				\tconst t = document.elementFromPoint({x}, {y}) || document.documentElement;\n\
				\tt.dispatchEvent(new MouseEvent('mousemove', {{bubbles: true, cancelable: true, view: window, clientX: {x}, clientY: {y}}}));\n\
				}})();"
			),
		}
	}

	/// Click at the current cursor point: resolve the topmost element there,
	/// run the `mousemove`/`mousedown`/`mouseup` sequence, then invoke the
	/// native click, so handlers listening on any of those fire.
	pub fn pointer_click(&self) -> Command {
		let CursorState { x, y } = self.cursor;
		Command::Exec {
			code: format!(
				"(() => {{\n\
				\tconst el = document.elementFromPoint({x}, {y});\n\
				\tif (!el) return;\n\
				\tconst opts = {{bubbles: true, cancelable: true, view: window, clientX: {x}, clientY: {y}}};\n\
				\tel.dispatchEvent(new MouseEvent('mousemove', opts));\n\
				\tel.dispatchEvent(new MouseEvent('mousedown', opts));\n\
				\tel.dispatchEvent(new MouseEvent('mouseup', opts));\n\
				\tel.click();\n\
				}})();"
			),
		}
	}

	/// Relative scroll at the current viewport.
	pub fn scroll(&self, dx: f64, dy: f64) -> Command {
		Command::Exec {
			code: format!("window.scrollBy({{left: {dx}, top: {dy}, behavior: 'auto'}});"),
		}
	}

	/// D-pad direction or OK as a full key press-release pair.
	pub fn dpad(&self, key: DpadKey) -> Command {
		let name = key.js_key();
		key_pair_script(name, name)
	}

	/// Play/pause toggle. Defaults to space; some services bind a dedicated
	/// key instead (e.g. "k"), which callers pass per service.
	pub fn play_toggle(&self, service_key: Option<&str>) -> Command {
		match service_key {
			None | Some(" ") => key_pair_script(" ", "Space"),
			Some(key) => {
				let code = key_code_for(key);
				key_pair_script(key, &code)
			}
		}
	}
}

/// Down+up pair aimed at the focused element; many pages only react to the
/// full press-release sequence, never to a lone keydown.
fn key_pair_script(key: &str, code: &str) -> Command {
	Command::Exec {
		code: format!(
			"(() => {{\n\
			\tconst t = document.activeElement || document.body;\n\
			\tconst opts = {{bubbles: true, cancelable: true, key: '{key}', code: '{code}'}};\n\
			\tt.dispatchEvent(new KeyboardEvent('keydown', opts));\n\
			\tt.dispatchEvent(new KeyboardEvent('keyup', opts));\n\
			}})();"
		),
	}
}

fn key_code_for(key: &str) -> String {
	match key.chars().next() {
		Some(c) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
		Some(c) if c.is_ascii_digit() => format!("Digit{c}"),
		_ => key.to_string(),
	}
}
