use crate::tests::exec_keys;

#[test]
fn ex_delete() {
	exec_keys(
		"Foo\nBar\nBiz",
		":d",
		"Bar\nBiz"
	);
}

#[test]
fn ex_yank() {
	exec_keys(
		"\tFoo\nBar\nBiz",
		":y<CR>jp",
		"\tFoo\nBar\n\tFoo\nBiz"
	);
}

#[test]
fn ex_put() {
	exec_keys(
		"Foo\nBar\nBiz",
		":1y<CR>:2p",
		"Foo\nBar\nFoo\nBiz"
	);
	exec_keys(
		"Foo\nBar\nBiz",
		":d<CR>:1,2p<CR>",
		"Bar\nFoo\nBiz\nFoo"
	);
}

#[test]
fn ex_substitution() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":%s/Foo/Replaced/g",
		"Replaced\nBar\nBiz\nReplaced\nBuzz\nReplaced\nBaz",
	);
}

#[test]
fn ex_normal() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":/Biz/normal! iNew Text",
		"Foo\nBar\nNew TextBiz\nFoo\nBuzz\nFoo\nBaz",
	);
}

#[test]
fn ex_global_delete() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":g/Foo/d",
		"Bar\nBiz\nBuzz\nBaz",
	);
}

#[test]
fn ex_global_normal() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":g/Foo/normal! iNew Text",
		"New TextFoo\nBar\nBiz\nNew TextFoo\nBuzz\nNew TextFoo\nBaz",
	);
}

#[test]
fn ex_global_normal_nested() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":g/Baz/normal! :g/Bar/normal! :g/Biz/normal! :g/Buzz/normal! :g/Foo/normal! cwWow!",
		"Wow!\nBar\nBiz\nWow!\nBuzz\nWow!\nBaz",
	);
}

#[test]
fn ex_move_reverses_lines() {
	exec_keys(
		"first\nsecond\nthird\nfourth",
		":g/^/m0<CR>",
		"fourth\nthird\nsecond\nfirst",
	);
}

#[test]
fn ex_global_invert_keeps_non_matches() {
	exec_keys(
		"Foo\nBar\nBiz\nFoo\nBuzz\nFoo\nBaz",
		":v/Foo/d",
		"Foo\nFoo\nFoo",
	);
}

#[test]
fn ex_sort_unique() {
	exec_keys(
		"biz\nfoo\nbar\nfoo\nbar",
		":sort u",
		"bar\nbiz\nfoo",
	);
}
