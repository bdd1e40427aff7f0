pub mod ast;
pub mod backend;
pub mod frontend;
pub mod snapshot;
pub mod ssa;
pub mod types;

use thiserror::Error;

use crate::backend::regalloc::AllocError;
use crate::ssa::{SsaProgram, StmtId};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lexical(#[from] frontend::lexer::LexicalError),

    #[error("Parse error at {line}:{col}: {message}")]
    Parse {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("StructuralError:{kind} - {message}")]
    Structural {
        kind: StructuralErrorKind,
        message: String,
    },

    #[error("TypeError:{kind} (SSA statement {stmt}) - {message}")]
    Type {
        kind: TypeErrorKind,
        stmt: StmtId,
        message: String,
    },

    #[error("Register allocation failed: {0}")]
    Alloc(#[from] AllocError),

    #[error("Code generation failed: {0}")]
    Codegen(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralErrorKind {
    DuplicateClass,
    DuplicateField,
    DuplicateMethod,
    DuplicateLocal,
    InvalidAssignmentTarget,
    UnresolvedType,
    CyclicInheritance,
}

impl std::fmt::Display for StructuralErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralErrorKind::DuplicateClass => write!(f, "DuplicateClass"),
            StructuralErrorKind::DuplicateField => write!(f, "DuplicateField"),
            StructuralErrorKind::DuplicateMethod => write!(f, "DuplicateMethod"),
            StructuralErrorKind::DuplicateLocal => write!(f, "DuplicateLocal"),
            StructuralErrorKind::InvalidAssignmentTarget => write!(f, "InvalidAssignmentTarget"),
            StructuralErrorKind::UnresolvedType => write!(f, "UnresolvedType"),
            StructuralErrorKind::CyclicInheritance => write!(f, "CyclicInheritance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    UnifyMismatch,
    ConditionNotBoolean,
    OperandNotInt,
    OperandNotBoolean,
    NotAnObject,
    NotAnArray,
    UnknownClass,
    UnknownField,
    UnknownMethod,
    ArgumentCount,
    ArgumentType,
    ReturnType,
    AssignmentType,
    ThisInMain,
    ParameterOutsideMethod,
    UntypedOperand,
}

impl std::fmt::Display for TypeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeErrorKind::UnifyMismatch => write!(f, "UnifyMismatch"),
            TypeErrorKind::ConditionNotBoolean => write!(f, "ConditionNotBoolean"),
            TypeErrorKind::OperandNotInt => write!(f, "OperandNotInt"),
            TypeErrorKind::OperandNotBoolean => write!(f, "OperandNotBoolean"),
            TypeErrorKind::NotAnObject => write!(f, "NotAnObject"),
            TypeErrorKind::NotAnArray => write!(f, "NotAnArray"),
            TypeErrorKind::UnknownClass => write!(f, "UnknownClass"),
            TypeErrorKind::UnknownField => write!(f, "UnknownField"),
            TypeErrorKind::UnknownMethod => write!(f, "UnknownMethod"),
            TypeErrorKind::ArgumentCount => write!(f, "ArgumentCount"),
            TypeErrorKind::ArgumentType => write!(f, "ArgumentType"),
            TypeErrorKind::ReturnType => write!(f, "ReturnType"),
            TypeErrorKind::AssignmentType => write!(f, "AssignmentType"),
            TypeErrorKind::ThisInMain => write!(f, "ThisInMain"),
            TypeErrorKind::ParameterOutsideMethod => write!(f, "ParameterOutsideMethod"),
            TypeErrorKind::UntypedOperand => write!(f, "UntypedOperand"),
        }
    }
}

/// Parse source text into a syntax tree.
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    frontend::parse_program(source)
}

/// Parse and lower to SSA without type checking.
pub fn compile_to_ssa(source: &str) -> Result<SsaProgram, CompileError> {
    let program = parse(source)?;
    ssa::build_program(&program)
}

/// Parse, lower and type check.
pub fn compile_to_checked_ssa(source: &str) -> Result<SsaProgram, CompileError> {
    let mut program = compile_to_ssa(source)?;
    types::type_check(&mut program)?;
    Ok(program)
}

/// Compile source text all the way to MIPS assembly.
pub fn compile_to_mips(source: &str) -> Result<String, CompileError> {
    let mut program = compile_to_checked_ssa(source)?;
    backend::compile_program(&mut program)
}
