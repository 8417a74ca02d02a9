use pretty_assertions::assert_eq;

use crate::driver::{execute, final_text, new_state};

pub const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum. Curabitur pretium tincidunt lacus. Nulla gravida orci a odio. Nullam varius, turpis et commodo pharetra.";

pub const LOREM_IPSUM_MULTILINE: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\nUt enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.\nDuis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur.\nExcepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum.\nCurabitur pretium tincidunt lacus. Nulla gravida orci a odio. Nullam varius, turpis et commodo pharetra.";

pub mod modes;
pub mod linebuf;
pub mod editor;

/// Runs `keys` (Vim keystroke notation) against `input` through the driver
/// entry points and asserts the resulting buffer equals `expected`.
pub fn exec_keys(input: &str, keys: &str, expected: &str) {
	let state = new_state(input, None);
	let state = execute(state, keys);
	assert_eq!(final_text(&state), expected);
}

// Integration tests exercising the driver end to end, one small editing
// scenario per test.

#[test]
fn numbering_lines_with_expression_register() {
	exec_keys(
		"foo\nbar\nbiz",
		":%s/^/\\=line('.').\". \"/<CR>",
		"1. foo\n2. bar\n3. biz",
	);
}

#[test]
fn removing_adjacent_duplicate_lines() {
	exec_keys(
		"foo\nfoo\nbar\nbar\nbar\nbiz",
		":%s/\\v^(.*)\\n\\1$/\\1/<CR>",
		"foo\nbar\nbar\nbiz",
	);
}

#[test]
fn reversing_lines_with_global_move() {
	exec_keys(
		"one\ntwo\nthree",
		":g/^/m0<CR>",
		"three\ntwo\none",
	);
}

#[test]
fn visual_block_append_semicolons() {
	exec_keys(
		"foo\nbar\nbiz",
		"<C-v>G$A;<Esc>",
		"foo;\nbar;\nbiz;",
	);
}

#[test]
fn macro_record_and_replay() {
	exec_keys(
		"foo\nbar\nbiz",
		"qaI-<Esc>jq@a",
		"-foo\n-bar\nbiz",
	);
}

#[test]
fn increment_and_decrement_number_under_cursor() {
	exec_keys("count: 9", "$<C-a>", "count: 10");
	exec_keys("count: 9", "$<C-x>", "count: 8");
}

#[test]
fn yaml_to_dotenv_with_inverse_global() {
	exec_keys(
		"# config map\nport: 8080\ndb_host: !ENV {DB_HOST}\n# another comment\ndb_port: !ENV {DB_PORT}\ndebug: false",
		":v/!ENV/d<CR>:%s/.*!ENV\\s*[${]\\([^}]*\\).*/\\1=/<CR>",
		"DB_HOST=\nDB_PORT=",
	);
}
