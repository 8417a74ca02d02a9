//! `modalcore` is a deterministic, headless Vi/Vim-style modal text editor
//! engine.
//!
//! This binary is a small demonstration driver, not the deliverable: it
//! reads an initial buffer, applies a keystroke string through the
//! library's `driver` module, and prints the result. Real callers are
//! expected to link against the `modalcore` library crate directly and
//! drive `Editor`/`driver::step` themselves.
use std::io::{self, Read, Write};
use std::fs;
use std::path::PathBuf;

use modalcore::driver;
use modalcore::modes::ViMode;
use modalcore::options::Options;

struct Args {
	file: Option<PathBuf>,
	keys: Option<String>,
	json: bool,
	trace: bool,
	options: Options,
}

fn parse_args() -> Result<Args, String> {
	let mut file = None;
	let mut keys = None;
	let mut json = false;
	let mut trace = false;
	let mut options = Options::default();

	let mut args = std::env::args().skip(1).peekable();
	while let Some(arg) = args.next() {
		match arg.as_str() {
			"-f" => {
				let path = args.next().ok_or("-f requires a file path")?;
				file = Some(PathBuf::from(path));
			}
			"--keys" => {
				keys = Some(args.next().ok_or("--keys requires a string")?);
			}
			"--json" => json = true,
			"--trace" => trace = true,
			"--ignorecase" => options.ignorecase = true,
			"--smartcase" => options.smartcase = true,
			"--no-wrapscan" => options.wrapscan = false,
			"--autoindent" => options.autoindent = true,
			"--help" | "-h" => {
				print_usage();
				std::process::exit(0);
			}
			other if !other.starts_with('-') && keys.is_none() => {
				keys = Some(other.to_string());
			}
			other => return Err(format!("unrecognized argument: {other}")),
		}
	}

	Ok(Args { file, keys, json, trace, options })
}

fn print_usage() {
	eprintln!("modalcore [-f FILE] [--keys KEYS] [--json] [--trace] [--ignorecase] [--smartcase] [--no-wrapscan] [--autoindent]");
	eprintln!("Reads an initial buffer from FILE or stdin, applies KEYS (Vim keystroke notation), prints the result.");
}

fn init_logger(trace: bool) {
	let mut builder = env_logger::builder();
	if trace {
		builder.filter(None, log::LevelFilter::Trace);
	}
	builder.format(move |buf, record| {
		let color = match record.level() {
			log::Level::Error => "\x1b[1;31m",
			log::Level::Warn => "\x1b[33m",
			log::Level::Info => "\x1b[32m",
			log::Level::Debug => "\x1b[34m",
			log::Level::Trace => "\x1b[36m",
		};
		writeln!(buf, "[{color}{}\x1b[0m] {}", record.level(), record.args())
	});
	builder.init();
}

fn read_initial_buffer(file: Option<&PathBuf>) -> Result<String, String> {
	match file {
		Some(path) => fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display())),
		None => {
			let mut buf = String::new();
			io::stdin().read_to_string(&mut buf).map_err(|e| e.to_string())?;
			Ok(buf)
		}
	}
}

fn complain_and_exit(err: impl std::fmt::Display) -> ! {
	eprintln!("modalcore: {err}");
	std::process::exit(1)
}

fn main() {
	let args = parse_args().unwrap_or_else(|e| complain_and_exit(e));
	init_logger(args.trace);

	let initial_text = read_initial_buffer(args.file.as_ref()).unwrap_or_else(|e| complain_and_exit(e));
	let keys = args.keys.unwrap_or_default();

	let state = driver::new_state(&initial_text, Some(args.options));
	let state = driver::execute(state, &keys);
	let final_text = driver::final_text(&state);

	if args.json {
		let mode = format!("{:?}", state.mode.report_mode());
		let replay = state.mode.as_replay().is_some();
		let out = serde_json::json!({
			"final_text": final_text,
			"mode": mode,
			"replay": replay,
		});
		println!("{}", serde_json::to_string_pretty(&out).unwrap());
	} else {
		print!("{final_text}");
	}
}
