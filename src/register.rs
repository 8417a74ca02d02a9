//! This module contains logic for emulation of Vim's registers feature.
//!
//! `Registers` is an ordinary struct owned by `LineBuf` (see `linebuf::LineBuf::registers`).
//! There is no global or thread-local register table; two independent editor states never
//! see each other's register contents.
use std::fmt::Display;

#[derive(Default,Debug,Clone)]
pub struct Registers {
	/// `"` — unnamed register. Mirrors the last yank/delete/change unless the
	/// command targeted the black hole register explicitly.
	unnamed: Register,
	/// `"0` is the last yank, `"1`-`"9` is the delete ring (shifted on every
	/// linewise or multi-line delete, `"9` falls off the end).
	numbered: [Register; 10],
	/// `"-` — last small (single-line, charwise) delete.
	small_delete: Register,
	/// `"a`-`"z` named registers. Uppercase names append instead of overwrite.
	named: [Register; 26],
	/// `"_` — writes vanish, reads always come back empty.
	black_hole: Register,
	/// `"/` — last search pattern.
	pub search: String,
	/// `".` — last inserted text.
	pub last_insert: String,
	/// `"=` — raw source text of the expression register. Evaluated lazily
	/// by the caller (see `crate::expr`) each time it is read, not here.
	pub expr_src: String,
}

impl Registers {
	pub fn new() -> Self {
		Self::default()
	}

	fn named_slot(&self, ch: char) -> Option<usize> {
		let ch = ch.to_ascii_lowercase();
		if ch.is_ascii_lowercase() {
			Some((ch as u8 - b'a') as usize)
		} else {
			None
		}
	}

	/// Read a register's content by name. `None` means the unnamed register.
	pub fn get(&self, name: Option<char>) -> RegisterContent {
		let Some(ch) = name else {
			return self.unnamed.content().clone()
		};
		match ch {
			'"' => self.unnamed.content().clone(),
			'_' => RegisterContent::Empty,
			'-' => self.small_delete.content().clone(),
			'/' => RegisterContent::Span(self.search.clone()),
			'.' => RegisterContent::Span(self.last_insert.clone()),
			'=' => RegisterContent::Span(self.expr_src.clone()),
			'0'..='9' => {
				let idx = ch as usize - '0' as usize;
				self.numbered[idx].content().clone()
			}
			c if c.is_ascii_alphabetic() => {
				let Some(idx) = self.named_slot(c) else { return RegisterContent::Empty };
				self.named[idx].content().clone()
			}
			_ => RegisterContent::Empty
		}
	}

	pub fn is_line(&self, name: Option<char>) -> bool {
		matches!(self.get(name), RegisterContent::Line(_))
	}
	pub fn is_block(&self) -> bool {
		false
	}

	fn reg_mut(&mut self, ch: char) -> Option<&mut Register> {
		match ch {
			'"' => Some(&mut self.unnamed),
			'_' => None,
			'-' => Some(&mut self.small_delete),
			'0'..='9' => Some(&mut self.numbered[ch as usize - '0' as usize]),
			c if c.is_ascii_alphabetic() => {
				let idx = self.named_slot(c)?;
				Some(&mut self.named[idx])
			}
			_ => None
		}
	}

	/// Direct write, honoring the black hole register. Used for plain
	/// `"xyy`-style explicit targets that are neither yank nor delete
	/// (e.g. writing macro text on `q{reg}`).
	pub fn set(&mut self, name: Option<char>, content: RegisterContent, append: bool) {
		let ch = name.unwrap_or('"');
		if ch == '_' {
			return;
		}
		if let Some(reg) = self.reg_mut(ch) {
			if append {
				reg.append(content);
			} else {
				reg.write(content);
			}
		}
	}

	/// Write-side rules for `y` (yank): the unnamed register always gets a
	/// copy (unless the explicit target was the black hole register), and
	/// `"0` always gets a copy of the yanked text.
	pub fn record_yank(&mut self, explicit: Option<char>, explicit_append: bool, content: RegisterContent) {
		if explicit == Some('_') {
			return;
		}
		if let Some(ch) = explicit {
			self.set(Some(ch), content.clone(), explicit_append);
		}
		self.numbered[0].write(content.clone());
		self.unnamed.write(content);
	}

	/// Write-side rules for `d`/`c` (delete/change): the unnamed register
	/// always gets a copy. A linewise or multi-line delete shifts the
	/// numbered ring (`"1`..`"9`, oldest falls off); a small (single-line,
	/// charwise) delete instead goes to `"-`, leaving the ring untouched.
	/// An explicit black hole target discards the text everywhere.
	pub fn record_delete(&mut self, explicit: Option<char>, explicit_append: bool, content: RegisterContent, is_linewise_or_multiline: bool) {
		if explicit == Some('_') {
			return;
		}
		if let Some(ch) = explicit {
			self.set(Some(ch), content.clone(), explicit_append);
		}
		self.unnamed.write(content.clone());
		if is_linewise_or_multiline {
			for i in (1..9).rev() {
				let moved = self.numbered[i].content().clone();
				self.numbered[i+1].write(moved);
			}
			self.numbered[1].write(content);
		} else {
			self.small_delete.write(content);
		}
	}
}

#[derive(Default,Clone,Debug)]
pub enum RegisterContent {
	Span(String),
	Line(String),
	Block(Vec<String>),
	#[default]
	Empty
}

impl RegisterContent {
	pub fn clear(&mut self) {
		match self {
			Self::Span(s) => s.clear(),
			Self::Line(s) => s.clear(),
			Self::Block(v) => v.clear(),
			Self::Empty => {}
		}
	}
	pub fn len(&self) -> usize {
		match self {
			Self::Span(s) => s.len(),
			Self::Line(s) => s.len(),
			Self::Block(v) => v.len(),
			Self::Empty => 0
		}
	}
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Span(s) => s.is_empty(),
			Self::Line(s) => s.is_empty(),
			Self::Block(v) => v.is_empty(),
			Self::Empty => true
		}
	}
}

impl Display for RegisterContent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Span(s) => write!(f, "{}", s),
			Self::Line(s) => write!(f, "{}", s),
			Self::Block(v) => write!(f, "{}", v.join("\n")),
			Self::Empty => write!(f, "")
		}
	}
}

/// A single register.
#[derive(Clone,Default,Debug)]
pub struct Register {
	content: RegisterContent,
}
impl Register {
	pub const fn new() -> Self {
		Self {
			content: RegisterContent::Span(String::new()),
		}
	}
	pub fn content(&self) -> &RegisterContent {
		&self.content
	}
	pub fn write(&mut self, buf: RegisterContent) {
		self.content = buf
	}
	pub fn append(&mut self, buf: RegisterContent) {
		match buf {
			RegisterContent::Empty => {},
			RegisterContent::Span(ref s) |
			RegisterContent::Line(ref s) => {
				match &mut self.content {
					RegisterContent::Empty => self.content = buf,
					RegisterContent::Span(existing) => existing.push_str(s),
					RegisterContent::Line(existing) => existing.push_str(s),
					RegisterContent::Block(_) => {
						self.content = buf
					}
				}
			}
			RegisterContent::Block(v) => {
				match &mut self.content {
					RegisterContent::Block(existing) => existing.extend(v),
					_ => {
						self.content = RegisterContent::Block(v);
					}
				}
			}
		}
	}
	pub fn clear(&mut self) {
		self.content.clear()
	}
	pub fn is_line(&self) -> bool {
		matches!(self.content, RegisterContent::Line(_))
	}
	pub fn is_block(&self) -> bool {
		matches!(self.content, RegisterContent::Block(_))
	}
	pub fn is_span(&self) -> bool {
		matches!(self.content, RegisterContent::Span(_))
	}
}
