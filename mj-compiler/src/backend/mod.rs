//! MIPS backend. It allocates registers over SSA and lowers it to SPIM assembly.
//!
//! Module layout:
//! - `abi`: register file and calling-convention pins
//! - `instruction`: typed machine instructions and assembly output items
//! - `liveness`: per-statement dataflow liveness
//! - `regalloc`: graph-coloring allocation with spilling
//! - `layout`: object sizes, field offsets and vtables
//! - `codegen`: code generation driver (SSA → assembly)

pub mod abi;
pub mod codegen;
pub mod instruction;
pub mod layout;
pub mod liveness;
pub mod regalloc;

pub use codegen::MipsAsm;
pub use regalloc::{allocate_method, allocate_program, AllocError, MethodStats};

use crate::ssa::SsaProgram;
use crate::CompileError;
use abi::Register;

/// Registers available to the allocator when generating code.
pub const MIPS_REGISTERS: usize = Register::ALLOCATABLE.len();

/// Allocate with the full register file and emit assembly.
pub fn compile_program_asm(program: &mut SsaProgram) -> Result<MipsAsm, CompileError> {
    allocate_program(program, MIPS_REGISTERS)?;
    codegen::emit_program(program)
}

/// Allocate with the full register file and emit assembly text.
pub fn compile_program(program: &mut SsaProgram) -> Result<String, CompileError> {
    Ok(compile_program_asm(program)?.join())
}
