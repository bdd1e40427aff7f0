//! MIPS32 register file and the calling convention.

use std::fmt;

use crate::ssa::{Op, Pin, SsaMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Zero,
    V0, V1,
    A0, A1, A2, A3,
    T0, T1, T2, T3, T4, T5, T6, T7,
    S0, S1, S2, S3, S4, S5, S6, S7,
    T8, T9,
    Sp, Fp, Ra,
}

pub const WORD_SIZE: i32 = 4;

impl Register {
    /// Allocatable registers, indexed by color. Colors 0..=3 are the argument registers.
    pub const ALLOCATABLE: [Register; 22] = [
        Register::A0, Register::A1, Register::A2, Register::A3,
        Register::T0, Register::T1, Register::T2, Register::T3,
        Register::T4, Register::T5, Register::T6, Register::T7,
        Register::S0, Register::S1, Register::S2, Register::S3,
        Register::S4, Register::S5, Register::S6, Register::S7,
        Register::T8, Register::T9,
    ];

    pub const ARG_REGS: [Register; 4] = [Register::A0, Register::A1, Register::A2, Register::A3];

    /// Saved by the caller around anything that jumps away, in save order.
    pub const CALLER_SAVED: [Register; 16] = [
        Register::V0, Register::V1,
        Register::A0, Register::A1, Register::A2, Register::A3,
        Register::T0, Register::T1, Register::T2, Register::T3,
        Register::T4, Register::T5, Register::T6, Register::T7,
        Register::T8, Register::T9,
    ];

    pub const CALLEE_SAVED: [Register; 8] = [
        Register::S0, Register::S1, Register::S2, Register::S3,
        Register::S4, Register::S5, Register::S6, Register::S7,
    ];

    /// Holds the receiver for the whole method body.
    pub const THIS: Register = Register::V0;
    pub const RESULT: Register = Register::V0;
    pub const SCRATCH: Register = Register::V1;

    pub fn for_color(color: usize) -> Option<Register> {
        Self::ALLOCATABLE.get(color).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Register::Zero => "$zero",
            Register::V0 => "$v0",
            Register::V1 => "$v1",
            Register::A0 => "$a0",
            Register::A1 => "$a1",
            Register::A2 => "$a2",
            Register::A3 => "$a3",
            Register::T0 => "$t0",
            Register::T1 => "$t1",
            Register::T2 => "$t2",
            Register::T3 => "$t3",
            Register::T4 => "$t4",
            Register::T5 => "$t5",
            Register::T6 => "$t6",
            Register::T7 => "$t7",
            Register::S0 => "$s0",
            Register::S1 => "$s1",
            Register::S2 => "$s2",
            Register::S3 => "$s3",
            Register::S4 => "$s4",
            Register::S5 => "$s5",
            Register::S6 => "$s6",
            Register::S7 => "$s7",
            Register::T8 => "$t8",
            Register::T9 => "$t9",
            Register::Sp => "$sp",
            Register::Fp => "$fp",
            Register::Ra => "$ra",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many caller-saved registers a method touching `used` colors must save.
///
/// `$v0`/`$v1` always, then the argument and temporary registers in color
/// order. Colors 12..20 are callee-saved and cost nothing here.
pub fn caller_saved_count(used: usize) -> usize {
    if used <= 12 {
        2 + used
    } else if used <= 20 {
        14
    } else {
        14 + (used - 20)
    }
}

/// How many `$s` registers the prologue must preserve.
pub fn callee_saved_count(used: usize) -> usize {
    used.saturating_sub(12).min(Register::CALLEE_SAVED.len())
}

/// Pin incoming parameters and outgoing arguments to their convention
/// locations: positions below four live in `$a0..$a3`, outgoing arguments
/// beyond that are written straight to the stack.
pub fn pin_calling_convention(method: &mut SsaMethod) {
    for stmt in method.body.iter_mut() {
        let Some(position) = stmt.position() else {
            continue;
        };
        match stmt.op {
            Op::Parameter | Op::Arg if position < Register::ARG_REGS.len() => {
                stmt.pin = Some(Pin::Register(position));
                stmt.register = Some(position);
            }
            Op::Arg => {
                stmt.pin = Some(Pin::NoRegister);
                stmt.register = None;
            }
            _ => {}
        }
    }
}
