//! One-shot compilation snapshot.
//!
//! Runs the pipeline as far as [`Options`] ask and collects everything a
//! consumer needs (SSA dump, assembly, allocation statistics, or the error)
//! into one serializable value.

use serde::{Deserialize, Serialize};

use crate::backend::{self, codegen, MethodStats};
use crate::ssa::SsaProgram;
use crate::CompileError;

/// Options for [`snapshot`]. All fields are optional when deserialized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Run the type checker (default: true).
    #[serde(default = "default_true")]
    pub type_check: bool,
    /// Run register allocation with `registers` colors (default: false).
    #[serde(default)]
    pub allocate: bool,
    #[serde(default = "default_registers")]
    pub registers: usize,
    /// Emit MIPS assembly; allocates with the full register file (default: false).
    #[serde(default)]
    pub emit_asm: bool,
}

fn default_true() -> bool {
    true
}

fn default_registers() -> usize {
    15
}

impl Default for Options {
    fn default() -> Self {
        Self {
            type_check: true,
            allocate: false,
            registers: default_registers(),
            emit_asm: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CompileSnapshot {
    pub success: bool,
    pub error: Option<String>,
    /// SSA dump lines after the last pass that ran.
    pub ssa: Option<Vec<String>>,
    pub asm: Option<Vec<String>>,
    pub methods: Vec<MethodStats>,
}

pub fn snapshot(source: &str, opts: &Options) -> CompileSnapshot {
    let mut program = None;
    let result = run(source, opts, &mut program);
    let ssa = program.as_ref().map(SsaProgram::to_lines);
    match result {
        Ok((asm, methods)) => CompileSnapshot {
            success: true,
            error: None,
            ssa,
            asm,
            methods,
        },
        Err(e) => CompileSnapshot {
            success: false,
            error: Some(e.to_string()),
            ssa,
            asm: None,
            methods: Vec::new(),
        },
    }
}

type Outputs = (Option<Vec<String>>, Vec<MethodStats>);

fn run(
    source: &str,
    opts: &Options,
    slot: &mut Option<SsaProgram>,
) -> Result<Outputs, CompileError> {
    let program = slot.insert(crate::compile_to_ssa(source)?);
    if opts.type_check || opts.allocate || opts.emit_asm {
        crate::types::type_check(program)?;
    }
    if opts.emit_asm {
        let methods = backend::allocate_program(program, backend::MIPS_REGISTERS)?;
        let asm = codegen::emit_program(program)?;
        return Ok((Some(asm.lines()), methods));
    }
    if opts.allocate {
        let methods = backend::allocate_program(program, opts.registers)?;
        return Ok((None, methods));
    }
    Ok((None, Vec::new()))
}
