//! `joy` — the interactive REPL and file-running front end (`spec.md`
//! §6 "Command-line surface"). A plain-text read-eval-print loop over
//! [`joy_runtime::Interpreter`]; no TUI, no LSP, no bytecode back end —
//! those are out of scope.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use joy_core::{JoyConfig, Recovery};
use joy_runtime::Interpreter;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use config::RcConfig;

#[derive(Parser)]
#[command(name = "joy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive REPL and file runner for the Joy language")]
struct Args {
    /// Source file to run. Omit to start the interactive REPL.
    file: Option<PathBuf>,

    /// Autoput mode: 0 never print, 1 print+pop, 2 print the whole stack.
    #[arg(long)]
    autoput: Option<u8>,

    /// Echo mode: 0 off, 1 line text, 2 tab-prefixed, 3 line-numbered.
    #[arg(long)]
    echo: Option<u8>,

    /// Enable GC trace logging.
    #[arg(long)]
    gc_trace: bool,

    /// Definition file to preload before the REPL/file runs.
    #[arg(long)]
    lib: Option<PathBuf>,

    /// Skip loading `~/.joyrc.toml`.
    #[arg(long)]
    no_rc: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let rc = if args.no_rc { RcConfig::default() } else { RcConfig::load() };

    let config = JoyConfig {
        autoput: args.autoput.unwrap_or_else(|| rc.autoput.unwrap_or(1)),
        echo: args.echo.unwrap_or_else(|| rc.echo.unwrap_or(0)),
        enable_gc_trace: args.gc_trace || rc.gc_trace.unwrap_or(false),
        ..JoyConfig::default()
    };
    let mut interp = Interpreter::new(config);

    if let Some(lib) = args.lib.as_deref().or(rc.library.as_deref())
        && let Err(e) = interp.load_stdlib(lib)
    {
        eprintln!("joy: {}: {}", lib.display(), e.message);
        return ExitCode::FAILURE;
    }

    match args.file {
        Some(path) => run_file(&mut interp, &path),
        None => run_interactive(&mut interp),
    }
}

fn run_file(interp: &mut Interpreter, path: &std::path::Path) -> ExitCode {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("joy: {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    match interp.eval_file(file, &path.display().to_string()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

/// Read one line at a time from the terminal, applying echo the way
/// `spec.md` §6 describes it (a REPL concern — see `embed_core`'s
/// own doc comments for why the façade itself never echoes) and
/// handing each line to [`Interpreter::eval_string`] as its own phrase
/// source. A QUIT-class error ends the session with a nonzero exit
/// code; a RETRY-class error is reported (autoput's `on_error`
/// callback already printed it) and the loop continues.
fn run_interactive(interp: &mut Interpreter) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("joy: failed to start line editor: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut line_no: u32 = 0;

    loop {
        match editor.readline("joy? ") {
            Ok(line) => {
                line_no += 1;
                let _ = editor.add_history_entry(line.as_str());
                echo_line(interp.echo(), line_no, &line);
                if let Err(err) = interp.eval_string(&line)
                    && err.recovery() == Recovery::Quit
                {
                    return ExitCode::SUCCESS;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("joy: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
}

fn echo_line(mode: u8, line_no: u32, line: &str) {
    match mode {
        1 => println!("{line}"),
        2 => println!("\t{line}"),
        3 => println!("{line_no}: {line}"),
        _ => {}
    }
}
