use crate::vicmd::{CmdFlags, Direction, Motion, MotionCmd, RegisterName, To, Verb, VerbCmd, ViCmd, Word};
use crate::keys::{KeyEvent as E, KeyCode as K, ModKeys as M};

use super::{common_cmds, CmdReplay, ModeReport, ViMode};

/// `<C-K>` digraph table. Unrecognized pairs fall back to the second
/// character typed, per the spec for unknown digraphs.
const DIGRAPHS: &[(&str, char)] = &[
	("a:", 'ä'), ("o:", 'ö'), ("u:", 'ü'), ("A:", 'Ä'), ("O:", 'Ö'), ("U:", 'Ü'),
	("ss", 'ß'), ("e'", 'é'), ("e!", 'è'), ("a'", 'á'), ("a!", 'à'),
	("n~", 'ñ'), ("N~", 'Ñ'), ("c,", 'ç'), ("C,", 'Ç'),
	("SE", '§'), ("Co", '©'), ("Rg", '®'), ("14", '¼'), ("12", '½'), ("34", '¾'),
	("p*", 'π'), ("l*", 'λ'), ("d*", 'δ'), ("a*", 'α'), ("b*", 'β'),
];

fn lookup_digraph(a: char, b: char) -> char {
	let key = [a,b].iter().collect::<String>();
	DIGRAPHS.iter().find(|(k,_)| *k == key).map(|(_,ch)| *ch).unwrap_or(b)
}

#[derive(Default,Debug)]
pub struct ViInsert {
	cmds: Vec<ViCmd>,
	pending_cmd: ViCmd,
	repeat_count: u16,
	/// Set by `<C-r>`, waiting on the register-name keystroke that follows.
	pending_register_insert: bool,
	/// Set by `<C-r>=`: accumulates the expression typed until `<CR>`.
	pending_expr_register: Option<String>,
	/// Set by `<C-v>`, waiting on the keystroke (or digit run) that follows.
	pending_literal: bool,
	/// After `<C-v>` sees its first decimal digit, the digits collected so far.
	pending_literal_digits: Option<String>,
	/// Set by `<C-K>`: `Some(None)` waiting on the first digraph character,
	/// `Some(Some(c))` waiting on the second.
	pending_digraph: Option<Option<char>>,
}

impl ViInsert {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn with_count(mut self, repeat_count: u16) -> Self {
		self.repeat_count = repeat_count;
		self
	}
	pub fn register_and_return(&mut self) -> Option<ViCmd> {
		let mut cmd = self.take_cmd();
		cmd.normalize_counts();
		self.register_cmd(&cmd);
		Some(cmd)
	}
	/// Finishes a `<C-v>{digits}` literal character code: up to three decimal
	/// digits are read, then converted to the character with that code point.
	fn insert_literal_code(&mut self, digits: &str) -> Option<ViCmd> {
		let code: u32 = digits.parse().unwrap_or(0);
		let ch = char::from_u32(code).unwrap_or('\u{fffd}');
		self.pending_cmd.set_verb(VerbCmd(1,Verb::InsertChar(ch)));
		self.pending_cmd.set_motion(MotionCmd(1,Motion::ForwardChar));
		self.register_and_return()
	}
	pub fn ctrl_w_is_undo(&self) -> bool {
		let insert_count = self.cmds.iter().filter(|cmd| {
			matches!(cmd.verb(),Some(VerbCmd(1, Verb::InsertChar(_))))
		}).count();
		let backspace_count = self.cmds.iter().filter(|cmd| {
			matches!(cmd.verb(),Some(VerbCmd(1, Verb::Delete)))
		}).count();
		insert_count > backspace_count
	}
	pub fn register_cmd(&mut self, cmd: &ViCmd) {
		self.cmds.push(cmd.clone())
	}
	pub fn take_cmd(&mut self) -> ViCmd {
		std::mem::take(&mut self.pending_cmd)
	}
}

impl ViMode for ViInsert {
	fn handle_key(&mut self, key: E) -> Option<ViCmd> {
		if self.pending_register_insert {
			self.pending_register_insert = false;
			let E(K::Char(ch), M::NONE) = key else {
				return None
			};
			if ch == '=' {
				self.pending_expr_register = Some(String::new());
				return None
			}
			self.pending_cmd.set_verb(VerbCmd(1, Verb::InsertRegister(RegisterName::new(Some(ch), None))));
			return self.register_and_return()
		}
		if let Some(mut expr) = self.pending_expr_register.take() {
			match key {
				E(K::Char('\r'), M::NONE) | E(K::Enter, M::NONE) => {
					self.pending_cmd.set_verb(VerbCmd(1, Verb::InsertExprRegister(expr)));
					return self.register_and_return()
				}
				E(K::Esc, M::NONE) => {
					return None
				}
				E(K::Char(ch), M::NONE) => {
					expr.push(ch);
					self.pending_expr_register = Some(expr);
					return None
				}
				_ => {
					self.pending_expr_register = Some(expr);
					return None
				}
			}
		}
		if let Some(mut digits) = self.pending_literal_digits.take() {
			if let E(K::Char(ch), M::NONE) = key {
				if ch.is_ascii_digit() {
					digits.push(ch);
					if digits.len() < 3 {
						self.pending_literal_digits = Some(digits);
						return None
					}
					return self.insert_literal_code(&digits)
				}
			}
			return self.insert_literal_code(&digits)
		}
		if self.pending_literal {
			self.pending_literal = false;
			let E(K::Char(ch), M::NONE) = key else {
				return common_cmds(key)
			};
			if ch.is_ascii_digit() {
				self.pending_literal_digits = Some(ch.to_string());
				return None
			}
			self.pending_cmd.set_verb(VerbCmd(1,Verb::InsertChar(ch)));
			self.pending_cmd.set_motion(MotionCmd(1,Motion::ForwardChar));
			return self.register_and_return()
		}
		if let Some(slot) = self.pending_digraph.take() {
			let E(K::Char(ch), M::NONE) = key else {
				return None
			};
			match slot {
				None => {
					self.pending_digraph = Some(Some(ch));
					return None
				}
				Some(first) => {
					let ch = lookup_digraph(first, ch);
					self.pending_cmd.set_verb(VerbCmd(1,Verb::InsertChar(ch)));
					self.pending_cmd.set_motion(MotionCmd(1,Motion::ForwardChar));
					return self.register_and_return()
				}
			}
		}
		match key {
			E(K::Char('R'), M::CTRL) => {
				self.pending_register_insert = true;
				None
			}
			E(K::Char('V'), M::CTRL) => {
				self.pending_literal = true;
				None
			}
			E(K::Char('K'), M::CTRL) => {
				self.pending_digraph = Some(None);
				None
			}
			E(K::Char('O'), M::CTRL) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::NormalMode));
				self.pending_cmd.flags |= CmdFlags::ONE_SHOT;
				self.register_and_return()
			}
			E(K::Char('U'), M::CTRL) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::Delete));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::BeginningOfLine));
				self.register_and_return()
			}
			E(K::Char('T'), M::CTRL) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::Indent));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::WholeLine));
				self.register_and_return()
			}
			E(K::Char('D'), M::CTRL) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::Dedent));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::WholeLine));
				self.register_and_return()
			}
			E(K::Enter, M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::InsertChar('\n')));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::ForwardChar));
				self.register_and_return()
			}
			E(K::Char(ch), M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::InsertChar(ch)));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::ForwardChar));
				self.register_and_return()
			}
			E(K::Char('W'), M::CTRL) => {
				self.pending_cmd.set_verb(VerbCmd(1, Verb::Delete));
				self.pending_cmd.set_motion(MotionCmd(1, Motion::WordMotion(To::Start, Word::Normal, Direction::Backward)));
				self.register_and_return()
			}
			E(K::Char('H'), M::CTRL) |
			E(K::Backspace, M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::Delete));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::BackwardCharForced));
				self.register_and_return()
			}

			E(K::BackTab, M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::CompleteBackward));
				self.register_and_return()
			}

			E(K::Char('I'), M::CTRL) |
			E(K::Tab, M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::Complete));
				self.register_and_return()
			}

			E(K::Esc, M::NONE) => {
				self.pending_cmd.set_verb(VerbCmd(1,Verb::NormalMode));
				self.pending_cmd.set_motion(MotionCmd(1,Motion::BackwardChar));
				self.register_and_return()
			}
			_ => common_cmds(key)
		}
	}


	fn is_repeatable(&self) -> bool {
		true
	}

	fn as_replay(&self) -> Option<CmdReplay> {
		Some(CmdReplay::mode(self.cmds.clone(), self.repeat_count))
	}

	fn cursor_style(&self) -> String {
		"\x1b[6 q".to_string()
	}
	fn pending_seq(&self) -> Option<String> {
		None
	}
	fn move_cursor_on_undo(&self) -> bool {
	  true
	}
	fn clamp_cursor(&self) -> bool {
	  false
	}
	fn hist_scroll_start_pos(&self) -> Option<To> {
		Some(To::End)
	}
	fn report_mode(&self) -> ModeReport {
	  ModeReport::Insert
	}
}
