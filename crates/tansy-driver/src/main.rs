//! Thin CLI entry point (§6): read a source file, run it through
//! `tansy_runtime::interpret`, and map the result to a process exit code.
//! Everything interesting -- scanning, compiling, executing -- lives in
//! the library crates; this binary is just argv plumbing.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tansy_runtime::InterpretResult;

struct Args {
    path: PathBuf,
    disassemble: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut path = None;
    let mut disassemble = false;
    for arg in std::env::args().skip(1) {
        if arg == "--disassemble" {
            disassemble = true;
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            bail!("unexpected extra argument: {arg}");
        }
    }
    let path = path.context("usage: tansy [--disassemble] <script>")?;
    Ok(Args { path, disassemble })
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let source = std::fs::read_to_string(&args.path)
        .with_context(|| format!("could not read {}", args.path.display()))?;

    if args.disassemble {
        return disassemble(&source);
    }

    match tansy_runtime::interpret(&source, 1) {
        InterpretResult::Ok => Ok(()),
        InterpretResult::CompileError => std::process::exit(65),
        InterpretResult::RuntimeError => std::process::exit(70),
    }
}

#[cfg(feature = "disassemble")]
fn disassemble(source: &str) -> anyhow::Result<()> {
    let mut handler = tansy_util::Handler::new();
    let mut heap = tansy_value::Heap::new();
    let mut strings = tansy_value::Table::new();
    match tansy_compile::compile(source, 1, &mut handler, &mut heap, &mut strings) {
        Ok(function_ref) => {
            let function = heap.get(function_ref).as_function().expect("compile returns a function");
            print!("{}", tansy_compile::disassemble::disassemble_chunk(&function.chunk, &heap, "script"));
            Ok(())
        }
        Err(error) => {
            for diagnostic in error.diagnostics {
                eprintln!("{diagnostic}");
            }
            std::process::exit(65);
        }
    }
}

#[cfg(not(feature = "disassemble"))]
fn disassemble(_source: &str) -> anyhow::Result<()> {
    bail!("built without the `disassemble` feature");
}
