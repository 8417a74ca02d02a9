//! This module contains the `Editor` struct, which is the central container for state in the crate.
//!
//! Everything that moves through this crate passes through the `Editor` struct at some point.
use log::trace;

use crate::keys::{KeyCode, KeyEvent, ModKeys};
use crate::linebuf::{ordered, MotionKind};
use crate::modes::ex::ViEx;
use crate::modes::search::ViSearch;
use crate::reader::{KeyReader, RawReader};
use crate::register::RegisterContent;
use crate::vicmd::LineAddr;

use super::linebuf::{LineBuf, SelectAnchor, SelectMode};
use super::vicmd::{CmdFlags, Motion, MotionCmd, RegisterName, Verb, VerbCmd, ViCmd};
use super::modes::{CmdReplay, ModeReport, insert::ViInsert, ViMode, normal::ViNormal, replace::ViReplace, visual::ViVisual};

/// The driver: owns the keystroke source, the current mode handler, dot-repeat
/// and char-search-repeat state, macro recording state, and the `LineBuf`
/// editor state itself.
pub struct Editor {
	pub reader: RawReader,
	pub mode: Box<dyn ViMode>,
	pub repeat_action: Option<CmdReplay>,
	pub repeat_motion: Option<MotionCmd>,
	pub editor: LineBuf,

	/// Set while a `q{reg}` macro recording is in progress: the target
	/// register and the raw bytes typed since recording began.
	recording: Option<(RegisterName, Vec<u8>)>,
	/// The register name last played with `@{reg}`, so `@@` can repeat it.
	last_macro_reg: Option<char>,
	/// Set by `<C-o>` in Insert mode: the next complete Normal-mode command
	/// should return control to Insert instead of staying in Normal.
	one_shot_normal: bool,
}

impl Editor {
	pub fn new(input: String, cursor: usize) -> Result<Self,String> {
		Ok(Self {
			reader: RawReader::new(),
			mode: Box::new(ViNormal::new()),
			repeat_action: None,
			repeat_motion: None,
			editor: LineBuf::new().with_initial(input, cursor),
			recording: None,
			last_macro_reg: None,
			one_shot_normal: false,
		})
	}

	pub fn exec_loop(&mut self) -> Result<(),String> {
		loop {
			let Some((key, raw)) = self.reader.read_key_with_raw() else {
				break
			};
			if let Some((_, buf)) = self.recording.as_mut() {
				buf.extend_from_slice(&raw);
			}

			self.step_key(key)?;
		}
		if let ModeReport::Search | ModeReport::Ex = self.mode.report_mode()
			&& !self.mode.pending_seq().unwrap().is_empty() {
				// We have run out of keys with a pending sequence.
				// The user may have done something like "-c :%s/foo/bar/" and did not type the explicit "<CR>" to submit
				// Let's see if we get a command if we send the enter key for them :)
				self.step_key(KeyEvent(KeyCode::Char('\r'), ModKeys::NONE))?;
		}
		Ok(())
	}

	/// Process exactly one `KeyEvent` through the current mode handler. This
	/// is the concept-level `step` of the driver API (see `crate::driver`).
	pub fn step_key(&mut self, key: KeyEvent) -> Result<(),String> {
		let dispatching_one_shot = self.one_shot_normal && self.mode.report_mode() == ModeReport::Normal;
		let Some(mut cmd) = self.mode.handle_key_fallible(key)? else {
			return Ok(())
		};
		cmd.alter_line_motion_if_no_verb();
		let return_to_normal = cmd.flags.contains(CmdFlags::EXIT_CUR_MODE);

		self.exec_cmd(cmd)?;
		if dispatching_one_shot {
			self.one_shot_normal = false;
			if self.mode.report_mode() == ModeReport::Normal {
				self.mode = Box::new(ViInsert::new());
			}
		}
		if return_to_normal {
			self.set_normal_mode();
		}
		Ok(())
	}

	pub fn load_input(&mut self, input: &str) {
		let bytes = input.as_bytes();
		self.reader.load_bytes(bytes);
	}

	/// A fresh `ViNormal`, aware of whether a macro recording is currently in
	/// progress so `q` parses as "stop" instead of expecting a register argument.
	fn fresh_normal(&self) -> Box<dyn ViMode> {
		Box::new(ViNormal::new().with_recording(self.recording.is_some()))
	}

	pub fn set_normal_mode(&mut self) {
		let should_go_back_one = self.mode.report_mode() == ModeReport::Insert;
		self.mode = self.fresh_normal();
		self.editor.stop_selecting();
		if should_go_back_one {
			let new_pos = self.editor.cursor.ret_sub(1);
			// Leaving insert mode moves back one, but never crosses line boundaries
			if self.editor.grapheme_at(new_pos).is_some_and(|gr| gr != "\n") {
				self.editor.cursor.sub(1);
			}
		}
	}

	fn handle_mode_transition(&mut self, cmd: ViCmd) -> Result<(),String> {
		let mut select_mode = None;
		let mut is_insert_mode = false;
		let count = cmd.verb_count();
		if self.mode.report_mode() == ModeReport::Insert && self.editor.should_handle_block_insert() {
			self.editor.handle_block_insert();
		}
		let mut inserting_from_visual = false;
		let mut mode: Box<dyn ViMode> = match cmd.verb().unwrap().1 {
			Verb::Change |
			Verb::InsertModeLineBreak(_) |
			Verb::InsertMode => {
				is_insert_mode = true;
				inserting_from_visual = self.mode.report_mode() == ModeReport::Visual;

				Box::new(ViInsert::new().with_count(count as u16))
			}

			Verb::NormalMode => {
				if cmd.flags.contains(CmdFlags::ONE_SHOT) {
					self.one_shot_normal = true;
				}
				self.fresh_normal()
			}

			Verb::ReplaceMode => {
				Box::new(ViReplace::new())
			}

			Verb::VisualModeSelectLast => {
				if self.mode.report_mode() != ModeReport::Visual {
					self.editor.start_selecting(SelectMode::Char(SelectAnchor::Start));
				}
				self.editor.inserting_from_visual = false;
				let mut mode: Box<dyn ViMode> = Box::new(ViVisual::new());
				std::mem::swap(&mut mode, &mut self.mode);
				self.editor.set_cursor_clamp(self.mode.clamp_cursor());

				return self.editor.exec_cmd(cmd)
			}
			Verb::VisualMode => {
				select_mode = Some(SelectMode::Char(SelectAnchor::Start));
				Box::new(ViVisual::new())
			}
			Verb::VisualModeLine => {
				select_mode = Some(SelectMode::Line(SelectAnchor::Start));
				Box::new(ViVisual::new())
			}
			Verb::VisualModeBlock => {
				select_mode = Some(self.editor.get_block_select());
				Box::new(ViVisual::new())
			}

			// For these two we will return early instead of doing all the other stuff.
			// This is to preserve the line buffer's state while we are entering a pattern in search mode
			// If we continue from here, visual mode selections will be lost for instance.
			Verb::ExMode => {
				let mut mode: Box<dyn ViMode> = Box::new(ViEx::new(self.editor.selected_lines()));
				self.editor.inserting_from_visual = false;
				std::mem::swap(&mut mode, &mut self.mode);

				return Ok(())
			}
			Verb::SearchMode(count,dir) => {
				let mut mode: Box<dyn ViMode> = Box::new(ViSearch::new(count,dir));
				self.editor.inserting_from_visual = false;
				std::mem::swap(&mut mode, &mut self.mode);

				return Ok(())
			}

			_ => unreachable!()
		};

		self.editor.inserting_from_visual = inserting_from_visual;

		std::mem::swap(&mut mode, &mut self.mode);

		if mode.is_repeatable() {
			self.repeat_action = mode.as_replay();
		}

		self.editor.set_cursor_clamp(self.mode.clamp_cursor());
		self.editor.exec_cmd(cmd)?;

		if let Some(select_mode) = select_mode {
			self.editor.start_selecting(select_mode);
		} else {
			self.editor.stop_selecting();
		}
		if is_insert_mode {
			self.editor.mark_insert_mode_start_pos();
		} else {
			self.editor.clear_insert_mode_start_pos();
		}
		Ok(())
	}

	fn handle_cmd_repeat(&mut self, cmd: ViCmd) -> Result<(),String> {
		let Some(replay) = self.repeat_action.clone() else {
			return Ok(())
		};
		let ViCmd { verb, .. } = cmd;
		let VerbCmd(count,_) = verb.unwrap();
		match replay {
			CmdReplay::ModeReplay { cmds, mut repeat } => {
				if count > 1 {
					repeat = count as u16;
				}
				for _ in 0..repeat {
					let cmds = cmds.clone();
					for cmd in cmds {
						self.editor.exec_cmd(cmd)?
					}
				}
			}
			CmdReplay::Single(mut cmd) => {
				if count > 1 {
					// Override the counts with the one passed to the '.' command
					if cmd.verb.is_some() {
						if let Some(v_mut) = cmd.verb.as_mut() {
							v_mut.0 = count
						}
						if let Some(m_mut) = cmd.motion.as_mut() {
							m_mut.0 = 1
						}
					} else {
						return Ok(()) // it has to have a verb to be repeatable, something weird happened
					}
				}
				self.editor.exec_cmd(cmd)?;
			}
			_ => unreachable!("motions should be handled in the other branch")
		}
		Ok(())
	}

	fn handle_motion_repeat(&mut self, cmd: ViCmd) -> Result<(),String> {
		match cmd.motion.as_ref().unwrap() {
			MotionCmd(count,Motion::RepeatMotion) => {
				let Some(motion) = self.repeat_motion.clone() else {
					return Ok(())
				};
				let repeat_cmd = ViCmd {
					register: RegisterName::default(),
					verb: cmd.verb().cloned(),
					motion: Some(motion),
					raw_seq: format!("{count};"),
					flags: CmdFlags::empty()
				};
				self.editor.exec_cmd(repeat_cmd)
			}
			MotionCmd(count,Motion::RepeatMotionRev) => {
				let Some(motion) = self.repeat_motion.clone() else {
					return Ok(())
				};
				let mut new_motion = motion.invert_char_motion();
				new_motion.0 = *count;
				let repeat_cmd = ViCmd {
					register: RegisterName::default(),
					verb: cmd.verb().cloned(),
					motion: Some(new_motion),
					raw_seq: format!("{count},"),
					flags: CmdFlags::empty()
				};
				self.editor.exec_cmd(repeat_cmd)
			}
			_ => unreachable!()
		}
	}

	/// `q{reg}` / bare `q` while recording: start or stop macro recording.
	/// The keystrokes making up the macro body are captured in `exec_loop`,
	/// not here — this just flips the recording state and, on stop, commits
	/// the captured bytes to the target register.
	fn handle_toggle_macro_recording(&mut self, reg: RegisterName) -> Result<(),String> {
		match self.recording.take() {
			Some((target, buf)) => {
				let text = String::from_utf8_lossy(&buf).into_owned();
				self.editor.registers.set(target.name(), RegisterContent::Span(text), target.is_append());
			}
			None => {
				self.recording = Some((reg, Vec::new()));
			}
		}
		Ok(())
	}

	/// `@{reg}` / `@@`: replay a register's text as keystrokes, `count` times.
	fn handle_execute_macro(&mut self, cmd: &ViCmd, reg: RegisterName) -> Result<(),String> {
		let name = match reg.name() {
			Some('@') => self.last_macro_reg,
			other => other,
		};
		self.last_macro_reg = name;
		let Some(name) = name else { return Ok(()) };
		let content = self.editor.registers.get(Some(name)).to_string();
		if content.is_empty() {
			return Ok(());
		}
		let repeat = cmd.verb_count().max(1);
		for _ in 0..repeat {
			self.reader.push_bytes_front(content.as_bytes());
		}
		self.exec_loop()
	}

	pub fn exec_cmd(&mut self, mut cmd: ViCmd) -> Result<(),String> {
		if let Some(VerbCmd(_, Verb::ToggleMacroRecording(reg))) = cmd.verb().cloned() {
			return self.handle_toggle_macro_recording(reg)
		} else if let Some(VerbCmd(_, Verb::ExecuteMacro(reg))) = cmd.verb().cloned() {
			return self.handle_execute_macro(&cmd, reg)
		}

		if cmd.is_mode_transition() {
			return self.handle_mode_transition(cmd)

		} else if cmd.is_cmd_repeat() {
			return self.handle_cmd_repeat(cmd)

		} else if cmd.is_motion_repeat() {
			return self.handle_motion_repeat(cmd)

		} else if cmd.is_ex_global() {
			return self.exec_ex_global(cmd)

		} else if cmd.is_ex_normal() {
			return self.exec_ex_normal(cmd)

		}

		if cmd.is_repeatable() {
			if self.mode.report_mode() == ModeReport::Visual {
				// The motion is assigned in the line buffer execution, so we also have to assign it here
				// in order to be able to repeat it
				let range = self.editor.select_range().unwrap().clone();
				cmd.motion = Some(MotionCmd(1,Motion::Range(range)))
			}
			self.repeat_action = Some(CmdReplay::Single(cmd.clone()));
		}

		if cmd.is_char_search() {
			self.repeat_motion = cmd.motion.clone()
		}

		self.editor.set_cursor_clamp(self.mode.clamp_cursor());
		self.editor.exec_cmd(cmd.clone())?;

		if self.mode.report_mode() == ModeReport::Visual && cmd.verb().is_some_and(|v| v.1.is_edit()) {
			self.editor.stop_selecting();
			let mut mode: Box<dyn ViMode> = self.fresh_normal();
			std::mem::swap(&mut mode, &mut self.mode);
		}
		Ok(())
	}

	// Easier to handle these out here
	fn exec_ex_global(&mut self, cmd: ViCmd) -> Result<(),String> {
		let ViCmd { register, verb, motion, raw_seq, flags } = cmd;
		let kind = self.editor.eval_motion(verb.as_ref().map(|vcmd| &vcmd.1), motion.unwrap());
		let MotionKind::Lines(lines) = kind else {
			trace!("global command pattern failed to compile or matched no lines");
			return Ok(())
		};
		for line in lines {
			let Some((start,_)) = self.editor.line_bounds(line) else { break };
			self.editor.cursor.set(start);
			let new_cmd = ViCmd {
				register,
				verb: verb.clone(),
				motion: Some(MotionCmd(1, Motion::Line(LineAddr::Number(line + 1)))),
				raw_seq: raw_seq.clone(),
				flags,
			};
			self.exec_cmd(new_cmd)?;
		}

		Ok(())
	}
	fn exec_ex_normal(&mut self, cmd: ViCmd) -> Result<(),String> {
		let ViCmd { register: _, verb, motion, raw_seq: _, flags: _ } = cmd;
		let VerbCmd(_,Verb::Normal(seq)) = verb.unwrap() else { unreachable!() };
		let mut mode: Box<dyn ViMode> = self.fresh_normal();
		std::mem::swap(&mut self.mode, &mut mode);
		match motion.unwrap().1 {
			Motion::Line(addr) => {
				let line_no = self.editor.eval_line_addr(addr)
					.ok_or("Failed to evaluate line address".to_string())?;
				let (start,_) = self.editor.line_bounds(line_no)
					.ok_or(format!("Failed to get line bounds for line {line_no}"))?;
				self.editor.cursor.set(start);
				let expanded = expand_normal_expr_segs(&seq, line_no + 1);
				self.reader.push_bytes_front(expanded.as_bytes());

				self.exec_loop()?;
			}
			Motion::LineRange(start, end) => {
				let start_ln = self.editor.eval_line_addr(start)
					.ok_or("Failed to evaluate line address".to_string())?;
				let end_ln = self.editor.eval_line_addr(end)
					.ok_or("Failed to evaluate line address".to_string())?;
				let (start_ln,end_ln) = ordered(start_ln, end_ln);

				for line in start_ln..=end_ln {
					let mut mode: Box<dyn ViMode> = self.fresh_normal();
					std::mem::swap(&mut self.mode, &mut mode);

					let (start,_) = self.editor.line_bounds(line)
						.ok_or("Failed to evaluate line address".to_string())?;
					self.editor.cursor.set(start);
					let expanded = expand_normal_expr_segs(&seq, line + 1);
					self.reader.push_bytes_front(expanded.as_bytes());

					self.exec_loop()?;
				}
			}
			_ => unreachable!()
		}
		std::mem::swap(&mut self.mode, &mut mode);
		Ok(())
	}
}

/// Expands every literal `<C-R>={expr}<CR>` segment in a `:normal` argument
/// by evaluating `expr` and splicing in the result as plain text. Any other
/// text, including other bracket notation, is left untouched for the raw
/// reader to interpret as before.
fn expand_normal_expr_segs(seq: &str, lnum: usize) -> String {
	const OPEN: &str = "<C-R>=";
	let mut out = String::with_capacity(seq.len());
	let mut rest = seq;
	while let Some(start) = rest.find(OPEN) {
		out.push_str(&rest[..start]);
		let after_open = &rest[start + OPEN.len()..];
		match after_open.find("<CR>") {
			Some(end) => {
				let expr_src = &after_open[..end];
				let ctx = crate::expr::EvalCtx { lnum, count1: 1, submatches: vec![] };
				out.push_str(&crate::expr::eval_to_string(expr_src, &ctx));
				rest = &after_open[end + "<CR>".len()..];
			}
			None => {
				out.push_str(OPEN);
				rest = after_open;
			}
		}
	}
	out.push_str(rest);
	out
}
