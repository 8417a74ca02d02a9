use crate::tests::exec_keys;

#[test]
fn visual_delete_selection() {
	exec_keys(
		"This text is (selected) and this is not.",
		"f(lvi)d",
		"This text is () and this is not.",
	);
}

#[test]
fn visual_line_yank_and_put() {
	exec_keys(
		"Foo\nBar\nBiz",
		"Vyjp",
		"Foo\nBar\nFoo\nBiz",
	);
}

#[test]
fn visual_uppercase_selection() {
	exec_keys(
		"foo bar biz",
		"veU",
		"FOO bar biz",
	);
}

#[test]
fn visual_togglecase_selection() {
	exec_keys(
		"Foo Bar",
		"vE~",
		"fOO Bar",
	);
}

#[test]
fn visual_indent_and_dedent_selection() {
	exec_keys(
		"foo\nbar",
		"Vj>",
		"\tfoo\n\tbar",
	);
	exec_keys(
		"\tfoo\n\tbar",
		"Vj<",
		"foo\nbar",
	);
}

#[test]
fn visual_swap_cursor_to_other_end() {
	exec_keys(
		"foo bar biz",
		"wvllohd",
		"foo r biz",
	);
}

#[test]
fn visual_gv_restores_last_selection() {
	exec_keys(
		"foo bar biz",
		"veU<esc>gvd",
		"bar biz",
	);
}

#[test]
fn visual_block_delete_column() {
	exec_keys(
		"foo\nbar\nbiz",
		"<C-v>jjld",
		"o\nr\nz",
	);
}
