//! Editor configuration, analogous to Vim's global options.
//!
//! Constructed with `Default`, then optionally overridden by the driver's
//! `new_state` entry point or by the demonstration binary's argv flags.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct Options {
	pub ignorecase: bool,
	pub smartcase: bool,
	pub hlsearch: bool,
	pub incsearch: bool,
	pub autoindent: bool,
	pub wrapscan: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			ignorecase: false,
			smartcase: false,
			hlsearch: true,
			incsearch: true,
			autoindent: false,
			wrapscan: true,
		}
	}
}
