use std::fs::read_to_string;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use colored::*;
use eevee::{errors, Eevee};

const EX_USAGE: u8 = 64;
const EX_SOFTWARE: u8 = 70;
const EX_IOERR: u8 = 74;

/// Eevee, a small imperative scripting language.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["file", "eval", "interactive"])))]
struct Args {
    /// Run a script file.
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Run one line of source and print the value of a bare expression.
    #[arg(short, long, value_name = "SOURCE")]
    eval: Option<String>,

    /// Read and run lines from stdin until it closes.
    #[arg(short, long)]
    interactive: bool,

    /// Print each parsed tree before running it.
    #[arg(long)]
    print_ast: bool,

    /// Log interpreter internals to stderr (same as RUST_LOG=eevee=debug).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EX_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(args.verbose);

    let mut session = Eevee::new().print_ast(args.print_ast);
    if let Some(path) = &args.file {
        run_file(&mut session, path)
    } else if let Some(source) = &args.eval {
        run_eval(&mut session, source)
    } else {
        run_prompt(&mut session)
    }
}

fn run_file(session: &mut Eevee, path: &Path) -> ExitCode {
    let source = match read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{} {}", "[Error]".red(), format!("could not read {}: {err}", path.display()).red());
            return ExitCode::from(EX_IOERR);
        }
    };
    session.run(&source);
    finish(session)
}

fn run_eval(session: &mut Eevee, source: &str) -> ExitCode {
    if let Some(value) = session.run_line(source) {
        println!("{value}");
    }
    finish(session)
}

fn finish(session: &Eevee) -> ExitCode {
    emit_all(session);
    if session.had_error() {
        ExitCode::from(EX_SOFTWARE)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt(session: &mut Eevee) -> ExitCode {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("{} {}", "[Error]".red(), err.to_string().red());
                return ExitCode::from(EX_IOERR);
            }
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Some(value) = session.run_line(&line) {
            println!("{}", value.to_string().bold().blue());
        }
        emit_all(session);
    }
    println!();
    ExitCode::SUCCESS
}

fn emit_all(session: &Eevee) {
    for diagnostic in session.diagnostics() {
        errors::emit(diagnostic);
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if !verbose && std::env::var("RUST_LOG").is_err() {
        return;
    }
    let filter = if verbose {
        EnvFilter::new("eevee=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true).with_level(true))
        .with(filter)
        .init();
}
