//! The small set of entry points a non-interactive caller uses to drive a
//! headless editing session: build state, feed it keystrokes, read the
//! result back out. Everything else in the crate (`modes`, `linebuf`,
//! `exec`) is reached through these functions, or through `Editor` directly
//! for callers that want to step one `KeyEvent` at a time.
//!
//! The core transition (`step`) is synchronous and touches no wall clock,
//! filesystem, or thread state, so the same keystrokes against the same
//! starting buffer always produce the same final buffer.
use crate::exec::Editor;
use crate::keys::KeyEvent;
use crate::options::Options;

/// The state threaded through a headless editing session. An `Editor` is
/// already exactly this: the current mode handler plus the `LineBuf`.
pub type EditorState = Editor;

/// Build a fresh session from the initial buffer text.
///
/// Mirrors Vim's own convention for a freshly opened buffer: the cursor
/// starts in Normal mode at the first character. `options`, when given,
/// replaces the defaults from `Options::default()`.
pub fn new_state(initial_text: &str, options: Option<Options>) -> EditorState {
	let mut state = Editor::new(initial_text.to_string(), 0)
		.expect("Editor::new never fails for a plain string buffer");
	if let Some(options) = options {
		state.editor.options = options;
	}
	state
}

/// Split a keystroke notation string into the `KeyEvent`s a real terminal
/// would have produced. See `crate::tokenizer` for the notation grammar.
pub fn tokenize(notation: &str) -> Vec<KeyEvent> {
	crate::tokenizer::tokenize(notation)
}

/// Feed a single token through the current mode handler.
///
/// Errors from a malformed or out-of-range command are contained inside
/// `step_key` itself (see its error-handling discipline); a `step` never
/// leaves the state malformed, so failures are swallowed here rather than
/// surfaced to the caller.
pub fn step(mut state: EditorState, token: KeyEvent) -> EditorState {
	let _ = state.step_key(token);
	state
}

/// Convenience wrapper: tokenize `keystrokes` and fold `step` over the
/// result.
pub fn execute(mut state: EditorState, keystrokes: &str) -> EditorState {
	for token in tokenize(keystrokes) {
		let _ = state.step_key(token);
	}
	state
}

/// The buffer's current text, newline-joined.
pub fn final_text(state: &EditorState) -> String {
	state.editor.as_str().to_string()
}

/// Canonical form used to compare two buffers for parity: CRLF folded to
/// LF, then a single trailing newline stripped.
pub fn normalize_text(s: &str) -> String {
	let s = s.replace("\r\n", "\n");
	match s.strip_suffix('\n') {
		Some(stripped) => stripped.to_string(),
		None => s,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trip_with_no_keys_is_identity() {
		let state = new_state("apple\nbanana\ncherry", None);
		let state = execute(state, "");
		assert_eq!(normalize_text(&final_text(&state)), normalize_text("apple\nbanana\ncherry"));
	}

	#[test]
	fn normalize_text_folds_crlf_and_trailing_newline() {
		assert_eq!(normalize_text("a\r\nb\r\n"), "a\nb");
		assert_eq!(normalize_text("a\nb\n"), "a\nb");
		assert_eq!(normalize_text("a\nb"), "a\nb");
	}

	#[test]
	fn execute_runs_a_simple_motion_and_edit() {
		let state = new_state("hello world", None);
		let state = execute(state, "dw");
		assert_eq!(final_text(&state), "world");
	}

	#[test]
	fn options_override_is_applied() {
		let opts = Options { ignorecase: true, ..Options::default() };
		let state = new_state("Hello", Some(opts));
		assert!(state.editor.options.ignorecase);
	}
}
