//! minic driver.
//!
//! ```bash
//! # Inspect the pipeline stages of a source file
//! minic dump-tokens main.mc
//! minic dump-ast main.mc
//! minic dump-ast-simple main.mc
//! minic dump-ir main.mc
//!
//! # Persist and reload the binary IR
//! minic dump-ir --binary out.mir main.mc
//! minic read-ir out.mir
//! ```
//!
//! Exit code 0 on success, 1 on a compile error. Warnings and diagnostics
//! go to stderr; dumps go to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use minic_core::ast::dump::DumpConfig;
use minic_core::diagnostics::{DiagConfig, Session};
use minic_core::{ir, lexer};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "minic")]
#[command(version)]
#[command(about = "Compiler front- and middle-end for a small C-family language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Suppress warnings
    #[arg(long, global = true)]
    no_warnings: bool,

    /// Leave line/column positions out of diagnostics
    #[arg(long, global = true)]
    no_location: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream
    DumpTokens {
        /// Source file
        file: PathBuf,
    },
    /// Print the AST with source positions
    DumpAst {
        /// Source file
        file: PathBuf,

        /// Color node names
        #[arg(long)]
        colored: bool,
    },
    /// Print the AST without source positions
    DumpAstSimple {
        /// Source file
        file: PathBuf,
    },
    /// Compile and print the IR listing
    DumpIr {
        /// Source file
        file: PathBuf,

        /// Also write the binary IR stream to this path
        #[arg(long)]
        binary: Option<PathBuf>,
    },
    /// Read a binary IR stream and print its listing
    ReadIr {
        /// Binary IR file produced by `dump-ir --binary`
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sess = Session::new(DiagConfig {
        ignore_warnings: cli.no_warnings,
        show_location: !cli.no_location,
    });
    match run(cli.command, sess) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(file: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))
}

/// Run a compile step, converting a `CompileError` into the session's
/// rendered form. This is the single place a compile error becomes a
/// user-visible failure.
fn rendered<T>(
    sess: &Session,
    result: Result<T, minic_core::CompileError>,
) -> anyhow::Result<T> {
    result.map_err(|e| anyhow::anyhow!("{}", sess.render_error(&e)))
}

fn drain_warnings(sess: &mut Session) {
    for warning in sess.take_warnings() {
        eprintln!("{warning}");
    }
}

fn run(command: Command, mut sess: Session) -> anyhow::Result<()> {
    match command {
        Command::DumpTokens { file } => {
            let source = read_source(&file)?;
            let tokens = rendered(&sess, lexer::tokenize(&source))?;
            for tok in tokens {
                println!("{}:{}: {}", tok.span.line, tok.span.col, tok.kind);
            }
        }
        Command::DumpAst { file, colored } => {
            let source = read_source(&file)?;
            let result = minic_core::compile_to_ast(&source, &mut sess);
            drain_warnings(&mut sess);
            let ast = rendered(&sess, result)?;
            print!(
                "{}",
                minic_core::ast::dump::dump_unit(
                    &ast,
                    DumpConfig {
                        omit_position: false,
                        colored,
                    }
                )
            );
        }
        Command::DumpAstSimple { file } => {
            let source = read_source(&file)?;
            let result = minic_core::compile_to_ast(&source, &mut sess);
            drain_warnings(&mut sess);
            let ast = rendered(&sess, result)?;
            print!(
                "{}",
                minic_core::ast::dump::dump_unit(
                    &ast,
                    DumpConfig {
                        omit_position: true,
                        colored: false,
                    }
                )
            );
        }
        Command::DumpIr { file, binary } => {
            let source = read_source(&file)?;
            let compiled = minic_core::compile(&source, &mut sess);
            drain_warnings(&mut sess);
            let result = rendered(&sess, compiled)?;
            if let Some(path) = binary {
                let bytes = ir::serialize::write_unit(&result.unit)?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("cannot write {}", path.display()))?;
            }
            print!("{}", ir::dump::dump_unit(&result.unit));
        }
        Command::ReadIr { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let unit = ir::serialize::read_unit(&bytes)?;
            print!("{}", ir::dump::dump_unit(&unit));
        }
    }
    Ok(())
}
