// ABOUTME: CLI driver — REPL and script-file entry points per the external
// ABOUTME: interface contract (exit codes 0/64/65/70)

mod ast;
mod env;
mod error;
mod interpreter;
mod lexer;
mod parser;
mod resolver;
mod token;
mod value;

use env::Environment;
use error::Diagnostics;
use interpreter::Interpreter;
use lexer::Lexer;
use parser::Parser;
use resolver::Resolver;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::rc::Rc;

const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let exit_code = match args.len() {
        1 => run_prompt(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: {} [script]", program_name(&args));
            EX_USAGE
        }
    };
    std::process::exit(exit_code);
}

fn program_name(args: &[String]) -> &str {
    args.first()
        .map(String::as_str)
        .unwrap_or(env!("CARGO_PKG_NAME"))
}

/// Reads the whole file and runs it once against a fresh environment.
fn run_file(path: &str) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("Cannot read file {path}: {err}");
            return EX_DATAERR;
        }
    };
    run_source(&source, Environment::new())
}

/// Interactive prompt: each line is compiled and run against the same
/// persistent global environment. A compile or runtime error on one line does
/// not exit the prompt. EOF (Ctrl-D) exits with status 0.
fn run_prompt() -> i32 {
    let config = Config::builder().auto_add_history(true).build();
    let mut editor = match Editor::<(), rustyline::history::DefaultHistory>::with_config(config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize prompt: {err}");
            return EX_SOFTWARE;
        }
    };

    let history_file = ".loxide_history";
    let _ = editor.load_history(history_file);

    let globals = Environment::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                // Errors are reported to stderr inside run_source; the
                // prompt always continues regardless of the line's outcome.
                run_source(&line, Rc::clone(&globals));
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = editor.save_history(history_file);
    0
}

/// Runs the lex -> parse -> resolve -> eval pipeline once against `source`,
/// reusing `globals` as the environment (so REPL lines see each other's
/// top-level declarations). A compile-phase error aborts before resolve; a
/// resolve-phase error aborts before eval.
fn run_source(source: &str, globals: Rc<Environment>) -> i32 {
    let mut diagnostics = Diagnostics::new();

    let tokens = Lexer::new(source).scan(&mut diagnostics);
    let statements = Parser::new(tokens, &mut diagnostics).parse();
    if diagnostics.had_error() {
        diagnostics.report_all();
        return EX_DATAERR;
    }

    let resolution = Resolver::new(&mut diagnostics).resolve(&statements);
    if diagnostics.had_error() {
        diagnostics.report_all();
        return EX_DATAERR;
    }

    let interpreter = Interpreter::with_globals(resolution, globals);
    match interpreter.interpret(&statements) {
        Ok(()) => 0,
        Err(err) => {
            err.report();
            EX_SOFTWARE
        }
    }
}
