//! MIPS machine-instruction types and assembly output items.
//!
//! This module defines the typed instruction subset the code generator emits
//! (`MipsInstr`), the three-register ALU operations (`AluOp`), and the
//! structured assembly output type (`AsmItem`) that is flattened to text.

use super::abi::Register;
use std::fmt;

// ============================================================================
// ALU operations
// ============================================================================

/// Three-operand arithmetic and set-on-condition operations.
///
/// The comparison forms are SPIM pseudo-instructions that write 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Slt,
    Sle,
    Sgt,
    Sge,
    Seq,
    Sne,
}

impl AluOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Mul => "mul",
            AluOp::Slt => "slt",
            AluOp::Sle => "sle",
            AluOp::Sgt => "sgt",
            AluOp::Sge => "sge",
            AluOp::Seq => "seq",
            AluOp::Sne => "sne",
        }
    }
}

// ============================================================================
// Typed MIPS instruction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MipsInstr {
    // ── Register / immediate arithmetic ─────────────────────────────────
    /// `op d, a, b`
    Alu {
        op: AluOp,
        d: Register,
        a: Register,
        b: Register,
    },
    /// `op d, a, imm`
    AluImm {
        op: AluOp,
        d: Register,
        a: Register,
        imm: i32,
    },
    /// `div a, b`: quotient in LO, remainder in HI
    Div { a: Register, b: Register },
    Mflo { d: Register },
    Mfhi { d: Register },
    Move { d: Register, s: Register },
    Li { d: Register, imm: i32 },
    La { d: Register, label: String },

    // ── Memory ──────────────────────────────────────────────────────────
    /// `lw d, offset(base)`
    Lw {
        d: Register,
        offset: i32,
        base: Register,
    },
    /// `sw s, offset(base)`
    Sw {
        s: Register,
        offset: i32,
        base: Register,
    },

    // ── Control flow ────────────────────────────────────────────────────
    Beq {
        a: Register,
        b: Register,
        label: String,
    },
    Bne {
        a: Register,
        b: Register,
        label: String,
    },
    J { label: String },
    Jal { label: String },
    Jalr { r: Register },
    Jr { r: Register },
    Syscall,
}

// ── Convenience constructors ────────────────────────────────────────────

impl MipsInstr {
    pub fn mov(d: Register, s: Register) -> Self {
        MipsInstr::Move { d, s }
    }

    /// `add $sp, $sp, delta`
    pub fn bump_sp(delta: i32) -> Self {
        MipsInstr::AluImm {
            op: AluOp::Add,
            d: Register::Sp,
            a: Register::Sp,
            imm: delta,
        }
    }

    /// Push one word: `add $sp, $sp, -4` then `sw r, ($sp)`.
    pub fn push(r: Register) -> [Self; 2] {
        [
            Self::bump_sp(-super::abi::WORD_SIZE),
            MipsInstr::Sw {
                s: r,
                offset: 0,
                base: Register::Sp,
            },
        ]
    }

    /// Pop one word into `r`.
    pub fn pop(r: Register) -> [Self; 2] {
        [
            MipsInstr::Lw {
                d: r,
                offset: 0,
                base: Register::Sp,
            },
            Self::bump_sp(super::abi::WORD_SIZE),
        ]
    }
}

fn addr(f: &mut fmt::Formatter<'_>, offset: i32, base: Register) -> fmt::Result {
    if offset == 0 {
        write!(f, "({base})")
    } else {
        write!(f, "{offset}({base})")
    }
}

// ── Display, lowered to assembly text ────────────────────────────────────

impl fmt::Display for MipsInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MipsInstr::Alu { op, d, a, b } => write!(f, "  {} {d}, {a}, {b}", op.mnemonic()),
            MipsInstr::AluImm { op, d, a, imm } => {
                write!(f, "  {} {d}, {a}, {imm}", op.mnemonic())
            }
            MipsInstr::Div { a, b } => write!(f, "  div {a}, {b}"),
            MipsInstr::Mflo { d } => write!(f, "  mflo {d}"),
            MipsInstr::Mfhi { d } => write!(f, "  mfhi {d}"),
            MipsInstr::Move { d, s } => write!(f, "  move {d}, {s}"),
            MipsInstr::Li { d, imm } => write!(f, "  li {d}, {imm}"),
            MipsInstr::La { d, label } => write!(f, "  la {d}, {label}"),
            MipsInstr::Lw { d, offset, base } => {
                write!(f, "  lw {d}, ")?;
                addr(f, *offset, *base)
            }
            MipsInstr::Sw { s, offset, base } => {
                write!(f, "  sw {s}, ")?;
                addr(f, *offset, *base)
            }
            MipsInstr::Beq { a, b, label } => write!(f, "  beq {a}, {b}, {label}"),
            MipsInstr::Bne { a, b, label } => write!(f, "  bne {a}, {b}, {label}"),
            MipsInstr::J { label } => write!(f, "  j {label}"),
            MipsInstr::Jal { label } => write!(f, "  jal {label}"),
            MipsInstr::Jalr { r } => write!(f, "  jalr {r}"),
            MipsInstr::Jr { r } => write!(f, "  jr {r}"),
            MipsInstr::Syscall => write!(f, "  syscall"),
        }
    }
}

// ============================================================================
// AsmItem, top-level assembly output element
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmItem {
    /// A label on its own line.
    Label(String),
    /// A typed machine instruction with an optional trailing comment.
    Instr {
        instr: MipsInstr,
        comment: Option<String>,
    },
    /// Assembler directive such as `.text` or `.word mj__m_A_f`.
    Directive(String),
    /// Full-line comment.
    Comment(String),
    /// Empty line separator.
    Blank,
}

impl From<MipsInstr> for AsmItem {
    fn from(instr: MipsInstr) -> Self {
        AsmItem::Instr {
            instr,
            comment: None,
        }
    }
}

impl fmt::Display for AsmItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmItem::Label(l) => write!(f, "{l}:"),
            AsmItem::Instr {
                instr,
                comment: Some(c),
            } => write!(f, "{instr}  # {c}"),
            AsmItem::Instr {
                instr,
                comment: None,
            } => write!(f, "{instr}"),
            AsmItem::Directive(d) => write!(f, "  {d}"),
            AsmItem::Comment(c) => write!(f, "# {c}"),
            AsmItem::Blank => Ok(()),
        }
    }
}
