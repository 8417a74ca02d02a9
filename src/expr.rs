//! A small evaluator for the Vim expression mini-language used by
//! `\=<expr>` substitution replacements, `<C-r>=`, and `:put =<expr>`.
//!
//! Grammar (loosest to tightest binding):
//!   ternary   := or ( '?' ternary ':' ternary )?
//!   or        := and ( '||' and )*
//!   and       := eq ( '&&' eq )*
//!   eq        := concat ( ('==' | '!=' | '<' | '>' | '<=' | '>=') concat )?
//!   concat    := add ( '.' add )*
//!   add       := mul ( ('+' | '-') mul )*
//!   mul       := unary ( ('*' | '/' | '%') unary )*
//!   unary     := ('!' | '-') unary | primary
//!   primary   := number | string | variable | call | '(' ternary ')'
//!
//! Any evaluation error (parse failure, unknown function, type mismatch)
//! collapses to an empty string rather than propagating, matching how a
//! single bad `\=` substitution should not abort the whole command.
#[derive(Debug,Clone,PartialEq)]
pub enum Val {
	Num(f64),
	Str(String),
	Bool(bool),
	List(Vec<Val>),
}

impl Val {
	pub fn as_string(&self) -> String {
		match self {
			Val::Num(n) => {
				if n.fract() == 0.0 && n.abs() < 1e15 {
					format!("{}", *n as i64)
				} else {
					format!("{n}")
				}
			}
			Val::Str(s) => s.clone(),
			Val::Bool(b) => if *b { "1".into() } else { "0".into() },
			Val::List(items) => items.iter().map(Val::as_string).collect::<Vec<_>>().join(" "),
		}
	}
	pub fn truthy(&self) -> bool {
		match self {
			Val::Num(n) => *n != 0.0,
			Val::Str(s) => !s.is_empty() && s != "0",
			Val::Bool(b) => *b,
			Val::List(items) => !items.is_empty(),
		}
	}
	pub fn as_num(&self) -> f64 {
		match self {
			Val::Num(n) => *n,
			Val::Str(s) => s.trim().parse().unwrap_or(0.0),
			Val::Bool(b) => if *b { 1.0 } else { 0.0 },
			Val::List(_) => 0.0,
		}
	}
}

/// Context bindings available to an evaluated expression.
#[derive(Debug,Clone,Default)]
pub struct EvalCtx {
	/// 1-indexed line number the expression is being evaluated for (`line('.')`, `v:lnum`).
	pub lnum: usize,
	/// `v:count1` — the count prefix of the triggering command, or 1.
	pub count1: usize,
	/// Capture groups of the match the replacement is running for. Index 0 is the whole match.
	pub submatches: Vec<String>,
}

pub fn eval(src: &str, ctx: &EvalCtx) -> Result<Val, String> {
	let tokens = lex(src)?;
	let mut p = Parser { tokens, pos: 0, ctx };
	let v = p.ternary()?;
	if p.pos != p.tokens.len() {
		return Err(format!("trailing input at token {}", p.pos));
	}
	Ok(v)
}

/// Convenience wrapper used by substitution replacement expansion: evaluates
/// `src` and swallows any error down to an empty string, per the containment
/// policy for expression-register/`\=` failures.
pub fn eval_to_string(src: &str, ctx: &EvalCtx) -> String {
	eval(src, ctx).map(|v| v.as_string()).unwrap_or_default()
}

#[derive(Debug,Clone,PartialEq)]
enum Tok {
	Num(f64),
	Str(String),
	Ident(String),
	Punct(&'static str),
}

fn lex(src: &str) -> Result<Vec<Tok>, String> {
	let mut out = vec![];
	let mut chars = src.chars().peekable();
	while let Some(&c) = chars.peek() {
		match c {
			' ' | '\t' => { chars.next(); }
			'0'..='9' => {
				let mut s = String::new();
				while let Some(&d) = chars.peek() {
					if d.is_ascii_digit() || d == '.' {
						s.push(d);
						chars.next();
					} else {
						break;
					}
				}
				out.push(Tok::Num(s.parse().map_err(|_| format!("bad number {s:?}"))?));
			}
			'\'' => {
				chars.next();
				let mut s = String::new();
				loop {
					match chars.next() {
						Some('\'') => {
							if chars.peek() == Some(&'\'') {
								s.push('\'');
								chars.next();
							} else {
								break;
							}
						}
						Some(ch) => s.push(ch),
						None => return Err("unclosed string literal".into()),
					}
				}
				out.push(Tok::Str(s));
			}
			'"' => {
				chars.next();
				let mut s = String::new();
				loop {
					match chars.next() {
						Some('"') => break,
						Some('\\') => {
							match chars.next() {
								Some('n') => s.push('\n'),
								Some('t') => s.push('\t'),
								Some('r') => s.push('\r'),
								Some('\\') => s.push('\\'),
								Some('"') => s.push('"'),
								Some(other) => s.push(other),
								None => return Err("unclosed string literal".into()),
							}
						}
						Some(ch) => s.push(ch),
						None => return Err("unclosed string literal".into()),
					}
				}
				out.push(Tok::Str(s));
			}
			'a'..='z' | 'A'..='Z' | '_' | ':' => {
				let mut s = String::new();
				while let Some(&d) = chars.peek() {
					if d.is_alphanumeric() || d == '_' || d == ':' {
						s.push(d);
						chars.next();
					} else {
						break;
					}
				}
				out.push(Tok::Ident(s));
			}
			'=' => {
				chars.next();
				if chars.peek() == Some(&'=') { chars.next(); out.push(Tok::Punct("==")); }
				else if chars.peek() == Some(&'~') { chars.next(); out.push(Tok::Punct("=~")); }
				else { return Err("unexpected '='".into()); }
			}
			'!' => {
				chars.next();
				if chars.peek() == Some(&'=') { chars.next(); out.push(Tok::Punct("!=")); }
				else if chars.peek() == Some(&'~') { chars.next(); out.push(Tok::Punct("!~")); }
				else { out.push(Tok::Punct("!")); }
			}
			'<' => {
				chars.next();
				if chars.peek() == Some(&'=') { chars.next(); out.push(Tok::Punct("<=")); }
				else { out.push(Tok::Punct("<")); }
			}
			'>' => {
				chars.next();
				if chars.peek() == Some(&'=') { chars.next(); out.push(Tok::Punct(">=")); }
				else { out.push(Tok::Punct(">")); }
			}
			'&' => {
				chars.next();
				if chars.peek() == Some(&'&') { chars.next(); out.push(Tok::Punct("&&")); }
				else { out.push(Tok::Punct("&")); }
			}
			'|' => {
				chars.next();
				if chars.peek() == Some(&'|') { chars.next(); out.push(Tok::Punct("||")); }
				else { out.push(Tok::Punct("|")); }
			}
			'.' | '+' | '-' | '*' | '/' | '%' | '?' | ':' | '(' | ')' | ',' | '[' | ']' => {
				let s: &'static str = match c {
					'.' => ".", '+' => "+", '-' => "-", '*' => "*", '/' => "/",
					'%' => "%", '?' => "?", ':' => ":", '(' => "(", ')' => ")",
					',' => ",", '[' => "[", ']' => "]",
					_ => unreachable!(),
				};
				chars.next();
				out.push(Tok::Punct(s));
			}
			other => return Err(format!("unexpected character {other:?}")),
		}
	}
	Ok(out)
}

struct Parser<'a> {
	tokens: Vec<Tok>,
	pos: usize,
	ctx: &'a EvalCtx,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<&Tok> {
		self.tokens.get(self.pos)
	}
	fn bump(&mut self) -> Option<Tok> {
		let t = self.tokens.get(self.pos).cloned();
		self.pos += 1;
		t
	}
	fn eat_punct(&mut self, p: &str) -> bool {
		if matches!(self.peek(), Some(Tok::Punct(x)) if *x == p) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn ternary(&mut self) -> Result<Val, String> {
		let cond = self.or()?;
		if self.eat_punct("?") {
			let t = self.ternary()?;
			if !self.eat_punct(":") {
				return Err("expected ':' in ternary".into());
			}
			let f = self.ternary()?;
			Ok(if cond.truthy() { t } else { f })
		} else {
			Ok(cond)
		}
	}
	fn or(&mut self) -> Result<Val, String> {
		let mut lhs = self.and()?;
		while self.eat_punct("||") {
			let rhs = self.and()?;
			lhs = Val::Bool(lhs.truthy() || rhs.truthy());
		}
		Ok(lhs)
	}
	fn and(&mut self) -> Result<Val, String> {
		let mut lhs = self.eq()?;
		while self.eat_punct("&&") {
			let rhs = self.eq()?;
			lhs = Val::Bool(lhs.truthy() && rhs.truthy());
		}
		Ok(lhs)
	}
	fn eq(&mut self) -> Result<Val, String> {
		let lhs = self.concat()?;
		for op in ["==", "!=", "<=", ">=", "<", ">"] {
			if self.eat_punct(op) {
				let rhs = self.concat()?;
				let result = match op {
					"==" => lhs.as_string() == rhs.as_string(),
					"!=" => lhs.as_string() != rhs.as_string(),
					"<" => lhs.as_num() < rhs.as_num(),
					">" => lhs.as_num() > rhs.as_num(),
					"<=" => lhs.as_num() <= rhs.as_num(),
					">=" => lhs.as_num() >= rhs.as_num(),
					_ => unreachable!(),
				};
				return Ok(Val::Bool(result));
			}
		}
		Ok(lhs)
	}
	fn concat(&mut self) -> Result<Val, String> {
		let mut lhs = self.add()?;
		while self.eat_punct(".") {
			let rhs = self.add()?;
			lhs = Val::Str(format!("{}{}", lhs.as_string(), rhs.as_string()));
		}
		Ok(lhs)
	}
	fn add(&mut self) -> Result<Val, String> {
		let mut lhs = self.mul()?;
		loop {
			if self.eat_punct("+") {
				let rhs = self.mul()?;
				lhs = Val::Num(lhs.as_num() + rhs.as_num());
			} else if self.eat_punct("-") {
				let rhs = self.mul()?;
				lhs = Val::Num(lhs.as_num() - rhs.as_num());
			} else {
				break;
			}
		}
		Ok(lhs)
	}
	fn mul(&mut self) -> Result<Val, String> {
		let mut lhs = self.unary()?;
		loop {
			if self.eat_punct("*") {
				let rhs = self.unary()?;
				lhs = Val::Num(lhs.as_num() * rhs.as_num());
			} else if self.eat_punct("/") {
				let rhs = self.unary()?;
				let d = rhs.as_num();
				lhs = Val::Num(if d == 0.0 { 0.0 } else { lhs.as_num() / d });
			} else if self.eat_punct("%") {
				let rhs = self.unary()?;
				let d = rhs.as_num();
				lhs = Val::Num(if d == 0.0 { 0.0 } else { (lhs.as_num() as i64 % d as i64) as f64 });
			} else {
				break;
			}
		}
		Ok(lhs)
	}
	fn unary(&mut self) -> Result<Val, String> {
		if self.eat_punct("!") {
			let v = self.unary()?;
			return Ok(Val::Bool(!v.truthy()));
		}
		if self.eat_punct("-") {
			let v = self.unary()?;
			return Ok(Val::Num(-v.as_num()));
		}
		self.primary()
	}
	fn primary(&mut self) -> Result<Val, String> {
		match self.bump() {
			Some(Tok::Num(n)) => Ok(Val::Num(n)),
			Some(Tok::Str(s)) => Ok(Val::Str(s)),
			Some(Tok::Punct("(")) => {
				let v = self.ternary()?;
				if !self.eat_punct(")") {
					return Err("expected ')'".into());
				}
				Ok(v)
			}
			Some(Tok::Punct("[")) => {
				let mut items = vec![];
				if !self.eat_punct("]") {
					loop {
						items.push(self.ternary()?);
						if self.eat_punct(",") { continue }
						break;
					}
					if !self.eat_punct("]") {
						return Err("expected ']'".into());
					}
				}
				Ok(Val::List(items))
			}
			Some(Tok::Ident(name)) => self.ident_or_call(name),
			other => Err(format!("unexpected token {other:?}")),
		}
	}
	fn ident_or_call(&mut self, name: String) -> Result<Val, String> {
		if self.eat_punct("(") {
			let mut args = vec![];
			if !self.eat_punct(")") {
				loop {
					args.push(self.ternary()?);
					if self.eat_punct(",") { continue }
					break;
				}
				if !self.eat_punct(")") {
					return Err("expected ')'".into());
				}
			}
			return call(&name, args, self.ctx);
		}
		match name.as_str() {
			"v:lnum" => Ok(Val::Num(self.ctx.lnum as f64)),
			"v:count1" => Ok(Val::Num(self.ctx.count1 as f64)),
			"pi" => Ok(Val::Num(std::f64::consts::PI)),
			_ => Err(format!("unknown variable {name:?}")),
		}
	}
}

fn call(name: &str, args: Vec<Val>, ctx: &EvalCtx) -> Result<Val, String> {
	match name {
		"submatch" => {
			let n = args.first().map(Val::as_num).unwrap_or(0.0) as usize;
			Ok(Val::Str(ctx.submatches.get(n).cloned().unwrap_or_default()))
		}
		"line" => {
			let which = args.first().map(Val::as_string).unwrap_or_default();
			match which.as_str() {
				"." => Ok(Val::Num(ctx.lnum as f64)),
				_ => Ok(Val::Num(ctx.lnum as f64)),
			}
		}
		"len" => {
			let v = args.first().cloned().unwrap_or(Val::Str(String::new()));
			match v {
				Val::List(items) => Ok(Val::Num(items.len() as f64)),
				other => Ok(Val::Num(other.as_string().chars().count() as f64)),
			}
		}
		"split" => {
			let s = args.first().map(Val::as_string).unwrap_or_default();
			let sep = args.get(1).map(Val::as_string);
			let items: Vec<Val> = match sep.as_deref() {
				None | Some("") => s.split_whitespace().map(|p| Val::Str(p.to_string())).collect(),
				Some(sep) => s.split(sep).map(|p| Val::Str(p.to_string())).collect(),
			};
			Ok(Val::List(items))
		}
		"join" => {
			let sep = args.get(1).map(Val::as_string).unwrap_or_else(|| " ".to_string());
			match args.first() {
				Some(Val::List(items)) => Ok(Val::Str(items.iter().map(Val::as_string).collect::<Vec<_>>().join(&sep))),
				Some(other) => Ok(Val::Str(other.as_string())),
				None => Ok(Val::Str(String::new())),
			}
		}
		"reverse" => {
			match args.into_iter().next() {
				Some(Val::List(mut items)) => {
					items.reverse();
					Ok(Val::List(items))
				}
				Some(Val::Str(s)) => Ok(Val::Str(s.chars().rev().collect())),
				other => Ok(other.unwrap_or(Val::Str(String::new()))),
			}
		}
		"toupper" => Ok(Val::Str(args.first().map(Val::as_string).unwrap_or_default().to_uppercase())),
		"tolower" => Ok(Val::Str(args.first().map(Val::as_string).unwrap_or_default().to_lowercase())),
		"strftime" => {
			let fmt = args.first().map(Val::as_string).unwrap_or_default();
			let epoch = args.get(1).map(Val::as_num).unwrap_or(0.0) as i64;
			Ok(Val::Str(crate::calendar::strftime(&fmt, epoch)))
		}
		"strptime" => {
			let fmt = args.first().map(Val::as_string).unwrap_or_default();
			let s = args.get(1).map(Val::as_string).unwrap_or_default();
			Ok(Val::Num(crate::calendar::strptime(&fmt, &s).unwrap_or(0) as f64))
		}
		"Pi" => Ok(Val::Str(crate::shellrunner::PI_DIGITS.to_string())),
		_ => Err(format!("unknown function {name:?}")),
	}
}

/// Expand a `:s` replacement template against a completed match.
///
/// `\=<expr>` (the whole template starting with those two characters) is
/// evaluated as a Vim expression with `submatch(n)` bound to the capture
/// groups. Otherwise the template is processed left to right honoring
/// `&`/`\0`-`\9` backreferences, `\r`/`\n`/`\t`, and the `\u`/`\l`/`\U`/`\L`/`\E`
/// case-transform escapes.
pub fn expand_replacement(template: &str, caps: &fancy_regex::Captures, lnum: usize) -> String {
	if let Some(expr_src) = template.strip_prefix("\\=") {
		let submatches = (0..10)
			.map(|n| caps.get(n).map(|m| m.as_str().to_string()).unwrap_or_default())
			.collect::<Vec<_>>();
		let ctx = EvalCtx { lnum, count1: 1, submatches };
		return eval_to_string(expr_src, &ctx);
	}

	fn push_cased(out: &mut String, s: &str, case_one: &mut Option<char>, case_run: &mut Option<char>) {
		for c in s.chars() {
			let c = if let Some(o) = case_one.take() {
				if o == 'u' { c.to_uppercase().next().unwrap_or(c) } else { c.to_lowercase().next().unwrap_or(c) }
			} else if let Some(r) = *case_run {
				if r == 'U' { c.to_uppercase().next().unwrap_or(c) } else { c.to_lowercase().next().unwrap_or(c) }
			} else {
				c
			};
			out.push(c);
		}
	}

	let mut out = String::new();
	let mut case_one: Option<char> = None;
	let mut case_run: Option<char> = None;
	let mut chars = template.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'&' => {
				let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("").to_string();
				push_cased(&mut out, &whole, &mut case_one, &mut case_run);
			}
			'\\' => match chars.next() {
				Some(d) if d.is_ascii_digit() => {
					let n = d.to_digit(10).unwrap() as usize;
					let grp = caps.get(n).map(|m| m.as_str()).unwrap_or("").to_string();
					push_cased(&mut out, &grp, &mut case_one, &mut case_run);
				}
				Some('r') => out.push('\r'),
				Some('n') => out.push('\n'),
				Some('t') => out.push('\t'),
				Some('u') => case_one = Some('u'),
				Some('l') => case_one = Some('l'),
				Some('U') => case_run = Some('U'),
				Some('L') => case_run = Some('L'),
				Some('E') => case_run = None,
				Some('&') => push_cased(&mut out, "&", &mut case_one, &mut case_run),
				Some('\\') => push_cased(&mut out, "\\", &mut case_one, &mut case_run),
				Some(other) => push_cased(&mut out, &other.to_string(), &mut case_one, &mut case_run),
				None => out.push('\\'),
			},
			_ => push_cased(&mut out, &c.to_string(), &mut case_one, &mut case_run),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ctx() -> EvalCtx {
		EvalCtx { lnum: 3, count1: 2, submatches: vec!["abc".into(), "a".into()] }
	}

	#[test]
	fn arithmetic_and_concat() {
		assert_eq!(eval("1 + 2 * 3", &ctx()).unwrap().as_string(), "7");
		assert_eq!(eval("'a' . 'b'", &ctx()).unwrap().as_string(), "ab");
	}

	#[test]
	fn ternary_and_vars() {
		assert_eq!(eval("v:lnum > 1 ? 'yes' : 'no'", &ctx()).unwrap().as_string(), "yes");
		assert_eq!(eval("v:count1", &ctx()).unwrap().as_string(), "2");
	}

	#[test]
	fn submatch_binding() {
		assert_eq!(eval("submatch(0) . '!'", &ctx()).unwrap().as_string(), "abc!");
	}

	#[test]
	fn unknown_function_errors() {
		assert!(eval("bogus(1)", &ctx()).is_err());
	}
}
