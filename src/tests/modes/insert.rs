use crate::tests::exec_keys;

use super::*;

#[test]
fn vimode_insert_structures() {
	let raw = "abcdefghijklmnopqrstuvwxyz1234567890-=[];'<>/\\x1b";
	let mut mode = ViInsert::new();
	let cmds = mode.cmds_from_raw(raw);
	insta::assert_debug_snapshot!(cmds)
}

#[test]
fn two_inserts() {
	exec_keys(
		"foo bar biz",
		"iInserting some text<esc>2wiAnd some more here too<esc>",
		"Inserting some textfoo bar And some more here toobiz",
	);
}

#[test]
fn ctrl_w() {
	exec_keys(
		"foo bar biz",
		"eiInserting_some_text<c-w>",
		"foo bar biz",
	);
}

#[test]
fn linebreaks() {
	// Also tests 'a' at the end of the buffer
	exec_keys(
		"foo bar biz",
		"$a<enter>bar foo biz",
		"foo bar biz\nbar foo biz",
	);
	exec_keys(
		"foo bar biz",
		"$a<CR>bar foo biz",
		"foo bar biz\nbar foo biz",
	)
}

#[test]
fn prefix_insert() {
	exec_keys(
		"    foo bar",
		"$Iinserting some text at the start",
		"    inserting some text at the startfoo bar"
	);
}

#[test]
fn insert_unicode() {
	exec_keys(
		"foo",
		"ea→bar",
		"foo→bar"
	);
}

#[test]
fn insert_in_empty_line() {
	exec_keys(
		"foo\n\nbiz",
		"jibar",
		"foo\nbar\nbiz"
	);
}

#[test]
fn insert_from_visual_mode() {
	exec_keys(
		"foo biz bar",
		"wveIinserting some text",
		"inserting some textfoo biz bar"
	);
	exec_keys(
		"foo biz bar",
		"wveAinserting some text",
		"foo bizinserting some text bar"
	);
}

#[test]
fn insert_empty_buffer() {
	exec_keys(
		"",
		"ihello world",
		"hello world"
	);
}

#[test]
fn enter_inserts_newline() {
	exec_keys(
		"foobar",
		"llli<CR>",
		"foo\nbar"
	);
}

#[test]
fn autoindent_carries_leading_whitespace_across_enter() {
	let state = crate::driver::new_state("    foo", Some(crate::options::Options { autoindent: true, ..Default::default() }));
	let state = crate::driver::execute(state, "A<CR>bar<Esc>");
	assert_eq!(crate::driver::final_text(&state), "    foo\n    bar");
}

#[test]
fn register_insert_with_ctrl_r() {
	exec_keys(
		"foo bar",
		"\"ayiwwi<C-r>a ",
		"foo foo bar"
	);
}

#[test]
fn literal_insert_with_ctrl_v() {
	exec_keys(
		"",
		"i<C-v>065",
		"A"
	);
}

#[test]
fn digraph_with_ctrl_k() {
	exec_keys(
		"",
		"i<C-K>a:",
		"ä"
	);
}

#[test]
fn one_shot_normal_with_ctrl_o() {
	exec_keys(
		"foo bar",
		"A<C-o>0X",
		"Xfoo bar"
	);
}

#[test]
fn delete_to_start_of_line_with_ctrl_u() {
	exec_keys(
		"foo bar",
		"A<C-u>",
		""
	);
}

#[test]
fn indent_and_dedent_with_ctrl_t_and_ctrl_d() {
	exec_keys(
		"foo",
		"i<C-t>",
		"\tfoo"
	);
	exec_keys(
		"\tfoo",
		"i<C-d>",
		"foo"
	);
}
