use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mj_compiler::snapshot::{snapshot, Options};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mjc")]
#[command(about = "A MiniJava compiler for MIPS (SPIM)")]
struct Args {
    /// Path to the MiniJava source file
    file: PathBuf,

    /// Type check and print the typed SSA
    #[arg(short = 't', long = "typecheck")]
    typecheck: bool,

    /// Allocate registers and print the allocated SSA
    #[arg(short = 'r', long = "regalloc")]
    regalloc: bool,

    /// Number of registers available to -r
    #[arg(short = 'k', long = "registers", default_value_t = 15)]
    registers: usize,

    /// Emit MIPS assembly (the default when no pass is selected)
    #[arg(long)]
    asm: bool,

    /// Print the whole compilation snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Log pass progress to stderr (-vv for per-round detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "mjc=debug,mj_compiler=debug",
        _ => "mjc=trace,mj_compiler=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether compilation succeeded.
fn run(args: &Args) -> Result<bool> {
    let src = fs::read_to_string(&args.file)
        .with_context(|| format!("reading '{}'", args.file.display()))?;

    let emit_asm = args.asm || !(args.typecheck || args.regalloc);
    let opts = Options {
        type_check: true,
        allocate: args.regalloc,
        registers: args.registers,
        emit_asm,
    };
    let snap = snapshot(&src, &opts);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(snap.success);
    }

    if let Some(error) = &snap.error {
        eprintln!("{}", error);
        return Ok(false);
    }

    if emit_asm {
        for line in snap.asm.iter().flatten() {
            println!("{}", line);
        }
    } else {
        for line in snap.ssa.iter().flatten() {
            println!("{}", line);
        }
        for stats in &snap.methods {
            tracing::info!(
                method = %stats.method,
                registers = stats.registers_used,
                spill_slots = stats.spill_slots,
                rounds = stats.rounds,
                "allocation"
            );
        }
    }
    Ok(true)
}
