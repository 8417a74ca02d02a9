//! Converts a keystroke notation string (`"dw"`, `"ihello<Esc>"`,
//! `"<C-r>a"`) into the sequence of `KeyEvent`s a real terminal would have
//! produced, one event per logical keystroke.
//!
//! Mode handlers (`ViNormal`, `ViVisual`, ...) already re-parse their own
//! `pending_seq` buffer from scratch on every character, so this module's
//! only job is the notation-to-KeyEvent split: `<...>` mnemonics collapse
//! to a single event, everything else is one event per character. The one
//! subtlety is that the character immediately following a bare `f`/`F`/`t`/`T`
//! keystroke must be taken as a literal character event even if it is `<`,
//! since mode handlers treat it as the search target, not the start of a
//! new mnemonic.
use crate::keys::{KeyCode, KeyEvent, ModKeys};

/// Caps a single tokenize call so a pathological, unterminated `<` run in
/// adversarial input can't blow up memory.
const MAX_TOKENS: usize = 1 << 20;

/// Convert a notation string into the `KeyEvent`s it denotes.
///
/// An unclosed `<...>` (no matching `>` before the string ends, or before
/// another `<` starts) is treated as a literal `<` followed by whatever
/// characters came after it, per the usual "malformed mnemonic degrades to
/// literal" rule.
pub fn tokenize(notation: &str) -> Vec<KeyEvent> {
	let mut out = Vec::new();
	let mut chars = notation.chars().peekable();
	let mut force_literal_next = false;

	while let Some(c) = chars.next() {
		if out.len() >= MAX_TOKENS {
			break;
		}

		if force_literal_next {
			force_literal_next = false;
			out.push(KeyEvent(KeyCode::Char(c), ModKeys::NONE));
			continue;
		}

		if c == '<' {
			if let Some(event) = try_parse_mnemonic(&mut chars) {
				out.push(event);
				continue;
			}
			// Not a recognized mnemonic (or unclosed): treat '<' as literal.
			out.push(KeyEvent(KeyCode::Char('<'), ModKeys::NONE));
			continue;
		}

		out.push(KeyEvent(KeyCode::Char(c), ModKeys::NONE));

		if matches!(c, 'f' | 'F' | 't' | 'T') {
			force_literal_next = true;
		}
	}

	out
}

/// Attempt to consume a `name...>` mnemonic body (the `<` has already been
/// consumed). Returns `None` (without having consumed anything irrevocably
/// beyond peeking) if the run doesn't close before `>` or the name is
/// unrecognized, so the caller can fall back to a literal `<`.
fn try_parse_mnemonic(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<KeyEvent> {
	let mut body = String::new();
	let mut lookahead = chars.clone();
	loop {
		match lookahead.next() {
			Some('>') => break,
			Some('<') | None => return None,
			Some(c) => body.push(c),
		}
	}
	let event = mnemonic_to_event(&body)?;
	*chars = lookahead;
	Some(event)
}

fn mnemonic_to_event(body: &str) -> Option<KeyEvent> {
	use KeyCode as K;
	use ModKeys as M;

	// `<C-x>`, `<S-Tab>`, `<C-S-x>`, `<A-x>` style modifier prefixes.
	let mut mods = M::NONE;
	let mut rest = body;
	loop {
		let mut advanced = false;
		for (prefix, m) in [("C-", M::CTRL), ("S-", M::SHIFT), ("A-", M::ALT), ("M-", M::ALT)] {
			if let Some(stripped) = rest.strip_prefix(prefix) {
				mods |= m;
				rest = stripped;
				advanced = true;
			}
		}
		if !advanced {
			break;
		}
	}

	let base = match rest.to_ascii_lowercase().as_str() {
		"esc" | "escape" => K::Esc,
		"cr" | "enter" | "return" => K::Enter,
		"bs" | "backspace" => K::Backspace,
		"tab" => K::Tab,
		"s-tab" | "backtab" => { mods.remove(M::SHIFT); K::BackTab }
		"space" => K::Char(' '),
		"lt" => K::Char('<'),
		"bar" => K::Char('|'),
		"bslash" => K::Char('\\'),
		"del" | "delete" => K::Delete,
		"up" => K::Up,
		"down" => K::Down,
		"left" => K::Left,
		"right" => K::Right,
		"home" => K::Home,
		"end" => K::End,
		"pageup" => K::PageUp,
		"pagedown" => K::PageDown,
		"nul" => K::Char('\0'),
		_ => {
			if rest.chars().count() == 1 {
				K::Char(rest.chars().next().unwrap())
			} else if let Some(n) = rest.strip_prefix('f').or_else(|| rest.strip_prefix('F')) {
				let n: u8 = n.parse().ok()?;
				K::F(n)
			} else {
				return None;
			}
		}
	};

	if mods.contains(M::CTRL) {
		if let K::Char(c) = base {
			return Some(KeyEvent(K::Char(c.to_ascii_uppercase()), mods));
		}
	}

	Some(KeyEvent(base, mods))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plain_text_is_one_event_per_char() {
		let events = tokenize("dw");
		assert_eq!(events, vec![
			KeyEvent(KeyCode::Char('d'), ModKeys::NONE),
			KeyEvent(KeyCode::Char('w'), ModKeys::NONE),
		]);
	}

	#[test]
	fn esc_mnemonic_collapses_to_one_event() {
		let events = tokenize("ihello<Esc>");
		assert_eq!(events.last(), Some(&KeyEvent(KeyCode::Esc, ModKeys::NONE)));
		assert_eq!(events.len(), "ihello".chars().count() + 1);
	}

	#[test]
	fn ctrl_mnemonic() {
		let events = tokenize("<C-r>");
		assert_eq!(events, vec![KeyEvent(KeyCode::Char('R'), ModKeys::CTRL)]);
	}

	#[test]
	fn unclosed_mnemonic_is_literal() {
		let events = tokenize("<abc");
		assert_eq!(events[0], KeyEvent(KeyCode::Char('<'), ModKeys::NONE));
	}

	#[test]
	fn find_motion_forces_literal_angle_bracket() {
		let events = tokenize("f<x");
		assert_eq!(events, vec![
			KeyEvent(KeyCode::Char('f'), ModKeys::NONE),
			KeyEvent(KeyCode::Char('<'), ModKeys::NONE),
			KeyEvent(KeyCode::Char('x'), ModKeys::NONE),
		]);
	}
}
