//! Translates Vim's regex dialect into the syntax understood by the
//! `fancy_regex` crate, and compiles the result.
//!
//! Vim's default ("magic") mode treats `( ) { } + ? |` as literal characters
//! unless backslash-escaped, the opposite of most regex engines. `\v`
//! ("very magic") flips that around to behave like a conventional regex.
//! This module rewrites a pattern written in either dialect into the host
//! engine's syntax before handing it to `fancy_regex::Regex::new`.
use fancy_regex::Regex;

const MAX_PATTERN_LEN: usize = 4096;

/// Translate a Vim pattern into `regex`-crate syntax.
///
/// Does not itself decide case sensitivity; see [`compile_vim_pattern`] for
/// the `ignorecase`/`smartcase`/`\c`/`\C` resolution.
pub fn translate(pattern: &str) -> Result<String, String> {
	if pattern.len() > MAX_PATTERN_LEN {
		return Err("pattern too long".into());
	}
	let very_magic = pattern.starts_with("\\v");
	let body = if very_magic { &pattern[2..] } else { pattern };

	let mut out = String::with_capacity(body.len() + 8);
	let mut chars = body.chars().peekable();

	while let Some(c) = chars.next() {
		if c == '\\' {
			let Some(next) = chars.next() else {
				out.push_str("\\\\");
				continue;
			};
			match next {
				'(' if !very_magic => out.push('('),
				')' if !very_magic => out.push(')'),
				'+' if !very_magic => out.push('+'),
				'?' if !very_magic => out.push('?'),
				'=' if !very_magic => out.push('?'),
				'|' if !very_magic => out.push('|'),
				'{' if !very_magic => out.push('{'),
				'}' if !very_magic => out.push('}'),
				'<' => out.push_str("\\b"),
				'>' => out.push_str("\\b"),
				'c' | 'C' => { /* case flags are handled by compile_vim_pattern, strip here */ }
				'v' | 'V' | 'm' | 'M' => { /* magic-mode switches mid-pattern: not supported, drop */ }
				'.' => out.push_str("\\."),
				'd' => out.push_str("\\d"),
				's' => out.push_str("\\s"),
				'S' => out.push_str("\\S"),
				'w' => out.push_str("\\w"),
				'W' => out.push_str("\\W"),
				'n' => out.push('\n'),
				't' => out.push('\t'),
				'1'..='9' => { out.push('\\'); out.push(next); }
				other => push_escaped_literal(&mut out, other),
			}
			continue;
		}

		if very_magic {
			out.push(c);
			continue;
		}

		match c {
			'(' | ')' | '+' | '?' | '|' | '{' | '}' => push_escaped_literal(&mut out, c),
			'[' => {
				// Character class: copy through verbatim, handling Vim's `[^]]` idiom
				// (a literal `]` as the first member of a negated class).
				out.push('[');
				if chars.peek() == Some(&'^') {
					out.push('^');
					chars.next();
				}
				if chars.peek() == Some(&']') {
					out.push_str("\\]");
					chars.next();
				}
				for cc in chars.by_ref() {
					if cc == ']' {
						out.push(']');
						break;
					}
					out.push(cc);
				}
			}
			_ => out.push(c),
		}
	}

	Ok(rewrite_non_greedy(&out))
}

const REGEX_META: &[char] = &['.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\'];

fn push_escaped_literal(out: &mut String, c: char) {
	if REGEX_META.contains(&c) {
		out.push('\\');
	}
	out.push(c);
}

/// Escapes every regex metacharacter in `s` so it matches only itself.
fn escape_literal(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		push_escaped_literal(&mut out, c);
	}
	out
}

/// Rewrite Vim's `\{-}`/`\{-n,}` non-greedy quantifiers (already converted
/// to `{-}`/`{-n,}` by the caller) into the host engine's `*?`/`+?`/`{n,}?`.
fn rewrite_non_greedy(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars().peekable();
	while let Some(c) = chars.next() {
		if c == '{' && chars.peek() == Some(&'-') {
			chars.next();
			let mut body = String::new();
			for cc in chars.by_ref() {
				if cc == '}' { break; }
				body.push(cc);
			}
			if body.is_empty() {
				out.push_str("*?");
			} else {
				out.push('{');
				out.push_str(&body);
				out.push_str("}?");
			}
		} else {
			out.push(c);
		}
	}
	out
}

/// Resolve whether a search should be case-insensitive, honoring Vim's
/// `\c`/`\C` overrides (which win outright) and falling back to
/// `smartcase`/`ignorecase`.
pub fn resolve_case_insensitive(pattern: &str, ignorecase: bool, smartcase: bool) -> bool {
	if pattern.contains("\\c") {
		return true;
	}
	if pattern.contains("\\C") {
		return false;
	}
	if !ignorecase {
		return false;
	}
	if smartcase && pattern.chars().any(|c| c.is_uppercase()) {
		return false;
	}
	true
}

/// Translate and compile a Vim pattern. Falls back to matching the pattern
/// as a fully-escaped literal string if translation or compilation fails,
/// so a single malformed pattern degrades gracefully instead of aborting
/// the whole command.
pub fn compile_vim_pattern(pattern: &str, ignorecase: bool, smartcase: bool) -> Result<Regex, String> {
	let case_insensitive = resolve_case_insensitive(pattern, ignorecase, smartcase);
	let translated = translate(pattern)?;
	let build = |src: &str| {
		// Multiline mode is harmless for single-line haystacks and lets `^`/`$`
		// anchor to embedded `\n`s when a pattern is matched across line
		// boundaries (e.g. a whole-buffer substitution pattern containing `\n`).
		let flags = if case_insensitive { "(?mi)" } else { "(?m)" };
		Regex::new(&format!("{flags}{src}"))
	};
	match build(&translated) {
		Ok(re) => Ok(re),
		Err(_) => {
			let literal = escape_literal(pattern);
			build(&literal).map_err(|e| e.to_string())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_magic_parens_are_literal() {
		let re = compile_vim_pattern("(abc)", false, false).unwrap();
		assert!(re.is_match("(abc)").unwrap());
		assert!(!re.is_match("abc").unwrap());
	}

	#[test]
	fn escaped_parens_become_groups() {
		let re = compile_vim_pattern("\\(abc\\)\\+", false, false).unwrap();
		assert!(re.is_match("abcabc").unwrap());
	}

	#[test]
	fn very_magic_mode_is_conventional() {
		let re = compile_vim_pattern("\\v(abc)+", false, false).unwrap();
		assert!(re.is_match("abcabc").unwrap());
	}

	#[test]
	fn very_magic_mode_keeps_backslash_classes() {
		let re = compile_vim_pattern("\\v(\\d+)", false, false).unwrap();
		let caps = re.captures("ab123").unwrap().unwrap();
		assert_eq!(&caps[1], "123");
	}

	#[test]
	fn non_greedy_rewrite() {
		let re = compile_vim_pattern("a\\{-}b", false, false).unwrap();
		let m = re.find("aaab").unwrap().unwrap();
		assert_eq!(m.as_str(), "aaab");
	}

	#[test]
	fn negated_class_with_bracket() {
		let re = compile_vim_pattern("[^]]", false, false).unwrap();
		assert!(re.is_match("x").unwrap());
		assert!(!re.is_match("]").unwrap());
	}

	#[test]
	fn smartcase_defers_to_uppercase_in_pattern() {
		assert!(resolve_case_insensitive("foo", true, true));
		assert!(!resolve_case_insensitive("Foo", true, true));
	}

	#[test]
	fn invalid_pattern_falls_back_to_literal() {
		let re = compile_vim_pattern("\\(unclosed", false, false).unwrap();
		assert!(re.is_match("(unclosed").unwrap());
	}
}
