//! `modalcore` is a deterministic, headless Vi/Vim-style modal text editor
//! engine.
//!
//! It turns a keystroke notation string and an initial buffer into a final
//! buffer, the same way a real terminal-attached Vim would, but with no
//! terminal, no screen, and no wall-clock or filesystem dependence in the
//! core transition itself. It exists to be driven by harnesses that need
//! an exact, reproducible replay of Vim-style edits: grading a recorded
//! keystroke sequence against an expected result, fuzzing motions, or
//! comparing two sequences for behavioral equivalence.
//!
//! ### High-level structure:
//! 1. A keystroke notation string (`"dw"`, `"ihello<Esc>"`, `"<C-r>a"`) is
//!    tokenized into the `KeyEvent`s a real terminal would have produced.
//! 2. An `Editor` holds the current mode handler and the `LineBuf` buffer
//!    state, and processes one `KeyEvent` at a time.
//! 3. `driver::final_text` reads the resulting buffer back out.
extern crate tikv_jemallocator;

#[cfg(target_os = "linux")]
#[global_allocator]
/// For linux we use Jemalloc. It is significantly faster than the default allocator for this workload.
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod calendar;
pub mod driver;
pub mod exec;
pub mod expr;
pub mod keys;
pub mod linebuf;
pub mod modes;
pub mod options;
pub mod reader;
pub mod register;
pub mod regex_vim;
pub mod shellrunner;
pub mod tokenizer;
pub mod vicmd;

#[cfg(test)]
pub mod tests;

pub use driver::{execute, final_text, new_state, normalize_text, step, tokenize, EditorState};
pub use exec::Editor;
pub use options::Options;
