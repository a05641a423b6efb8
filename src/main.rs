mod args;

use anyhow::{anyhow, bail, Context, Result};
use args::Args;
use clap::Parser;
use cmmc::ir::Instruction;
use cmmc::optimizer::{ControlFlowGraph, OptLevel};
use cmmc::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

struct StageTimer {
    enabled: bool,
}

impl StageTimer {
    fn time<T>(&self, stage: &str, run: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = run();
        if self.enabled {
            println!("  {stage}: {:.2?}", start.elapsed());
        }
        value
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = OptLevel::try_from(args.opt_level).map_err(|bad| anyhow!("bad opt level {bad}"))?;
    let timer = StageTimer {
        enabled: args.verbose,
    };

    if args.debug_info {
        println!("Warning: debug-info emission is not available in this build");
    }

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot open source file {}", args.input.display()))?;

    let tokens = match timer.time("lexical analysis", || lexer::lex(&source)) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("{err}");
            bail!("compilation failed");
        }
    };
    if args.print_stages {
        println!("Lexical analysis: {} tokens", tokens.len());
    }

    let outcome = timer.time("parsing", || parser::parse(&tokens));
    if !outcome.errors.is_empty() {
        for err in &outcome.errors {
            eprintln!("{err}");
        }
        bail!("compilation failed");
    }
    if args.print_stages {
        println!(
            "Parsing: {} top-level declarations",
            outcome.program.declarations.len()
        );
    }

    match timer.time("semantic analysis", || {
        semantic_analysis::analyze(&outcome.program)
    }) {
        Ok(analysis) => {
            for warning in &analysis.warnings {
                println!("{warning}");
            }
        }
        Err(errors) => {
            for err in &errors {
                eprintln!("{err}");
            }
            bail!("compilation failed");
        }
    }
    if args.print_stages {
        println!("Semantic analysis: passed");
    }

    let mut lowered = timer.time("IR generation", || irgen::generate(&outcome.program));
    if args.print_stages {
        println!("IR generation: {} instructions", lowered.code.len());
    }
    if args.print_ir {
        println!("=== Generated IR ===");
        for (i, instr) in lowered.code.iter().enumerate() {
            println!("{i}: {instr}");
        }
        println!("====================");
    }

    let generated = std::mem::take(&mut lowered.code);
    lowered.code = timer.time("optimization", || optimizer::optimize(generated, level));
    if args.print_stages {
        println!("Optimization: applied -O{}", args.opt_level);
    }

    if args.print_cfg {
        println!("=== Control Flow Graph ===");
        for region in function_regions(&lowered.code) {
            println!("{}", ControlFlowGraph::build(region));
        }
        println!("==========================");
    }

    let assembly = timer.time("code generation", || {
        emission::render(&codegen::generate(&lowered))
    });
    if args.print_asm {
        print!("{assembly}");
    }

    let paths = OutputPaths::resolve(&args);
    fs::write(&paths.assembly, &assembly)
        .with_context(|| format!("cannot write output file {}", paths.assembly.display()))?;
    if args.print_stages {
        println!(
            "Code generation: assembly written to {}",
            paths.assembly.display()
        );
    }
    if args.no_assemble {
        return Ok(());
    }

    let mut assemble = Command::new("as");
    assemble
        .arg("-64")
        .arg(&paths.assembly)
        .arg("-o")
        .arg(&paths.object);
    run_tool(&mut assemble, "assembler")?;
    if args.no_link {
        paths.cleanup(&args, false);
        return Ok(());
    }

    let mut link = Command::new("ld");
    link.arg(&paths.object).arg("-o").arg(&paths.executable);
    run_tool(&mut link, "linker")?;
    if args.print_stages {
        println!("Linking: executable written to {}", paths.executable.display());
    }
    paths.cleanup(&args, true);

    Ok(())
}

fn run_tool(command: &mut Command, what: &str) -> Result<()> {
    let status = command
        .status()
        .with_context(|| format!("cannot run {what}"))?;
    if !status.success() {
        bail!("{what} failed");
    }
    Ok(())
}

struct OutputPaths {
    assembly: PathBuf,
    object: PathBuf,
    executable: PathBuf,
}

impl OutputPaths {
    /// `-o` names the final artifact of the selected stop stage; earlier
    /// intermediates derive from the input stem.
    fn resolve(args: &Args) -> Self {
        let stem = |extension: &str| -> PathBuf {
            let mut path = args.input.clone();
            path.set_extension(extension);
            path
        };

        let assembly = match (&args.output, args.no_assemble) {
            (Some(output), true) => output.clone(),
            _ => stem("s"),
        };
        let object = match (&args.output, args.no_link) {
            (Some(output), true) => output.clone(),
            _ => stem("o"),
        };
        let executable = args.output.clone().unwrap_or_else(|| stem(""));

        Self {
            assembly,
            object,
            executable,
        }
    }

    fn cleanup(&self, args: &Args, remove_object: bool) {
        if args.keep_intermediate {
            return;
        }
        remove_quietly(&self.assembly);
        if remove_object {
            remove_quietly(&self.object);
        }
    }
}

fn remove_quietly(path: &Path) {
    let _ = fs::remove_file(path);
}

fn function_regions(code: &[Instruction]) -> Vec<&[Instruction]> {
    use cmmc::ir::OpCode;

    let mut starts: Vec<usize> = code
        .iter()
        .enumerate()
        .filter(|(_, i)| i.op == OpCode::FunctionBegin)
        .map(|(i, _)| i)
        .collect();
    if starts.first() != Some(&0) && !code.is_empty() {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(code.len());
            &code[start..end]
        })
        .collect()
}
