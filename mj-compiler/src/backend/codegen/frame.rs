//! Stack frame layout for one method.
//!
//! ```text
//!   caller's outgoing args   (p-3)*4($fp) for parameter p >= 4
//!   saved $fp                <- $fp
//!   spill slots              -(n+1)*4($fp)
//!   caller-saved save area
//!   callee-saved save area
//!   $ra
//!   outgoing args            (p-4)*4($sp) for argument p >= 4   <- $sp
//! ```

use crate::backend::abi::{self, Register, WORD_SIZE};
use crate::backend::regalloc::{registers_used, spill};
use crate::ssa::{Op, SsaMethod};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub spill_slots: usize,
    /// Leading entries of [`Register::CALLER_SAVED`] saved around calls.
    pub caller_saved: usize,
    /// Leading entries of [`Register::CALLEE_SAVED`] saved by the prologue.
    pub callee_saved: usize,
    pub outgoing: usize,
}

impl Frame {
    pub fn for_method(method: &SsaMethod) -> Self {
        let used = registers_used(method);
        let max_arg = method
            .body
            .iter()
            .filter(|s| s.op == Op::Arg)
            .filter_map(|s| s.position())
            .max();
        let outgoing = match max_arg {
            Some(p) if p >= Register::ARG_REGS.len() => p - (Register::ARG_REGS.len() - 1),
            _ => 0,
        };
        Self {
            spill_slots: spill::next_free_slot(&method.body),
            caller_saved: abi::caller_saved_count(used).min(Register::CALLER_SAVED.len()),
            callee_saved: abi::callee_saved_count(used),
            outgoing,
        }
    }

    /// Words reserved below the saved `$fp`.
    pub fn words(&self) -> usize {
        self.spill_slots + self.caller_saved + self.callee_saved + 1 + self.outgoing
    }

    fn below_fp(words: usize) -> i32 {
        -WORD_SIZE * words as i32
    }

    pub fn spill_offset(&self, slot: usize) -> i32 {
        Self::below_fp(slot + 1)
    }

    pub fn caller_save_offset(&self, index: usize) -> i32 {
        Self::below_fp(self.spill_slots + 1 + index)
    }

    pub fn callee_save_offset(&self, index: usize) -> i32 {
        Self::below_fp(self.spill_slots + self.caller_saved + 1 + index)
    }

    pub fn ra_offset(&self) -> i32 {
        Self::below_fp(self.spill_slots + self.caller_saved + self.callee_saved + 1)
    }

    /// Incoming stack parameter, relative to `$fp`.
    pub fn param_offset(position: usize) -> i32 {
        WORD_SIZE * (position as i32 - 3)
    }

    /// Outgoing stack argument, relative to `$sp`.
    pub fn arg_offset(position: usize) -> i32 {
        WORD_SIZE * (position as i32 - 4)
    }

    pub fn caller_saved_regs(&self) -> &'static [Register] {
        let all: &'static [Register] = &Register::CALLER_SAVED;
        &all[..self.caller_saved]
    }

    pub fn callee_saved_regs(&self) -> &'static [Register] {
        let all: &'static [Register] = &Register::CALLEE_SAVED;
        &all[..self.callee_saved]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_stack_down_from_fp() {
        let frame = Frame {
            spill_slots: 2,
            caller_saved: 3,
            callee_saved: 1,
            outgoing: 2,
        };
        assert_eq!(frame.spill_offset(0), -4);
        assert_eq!(frame.spill_offset(1), -8);
        assert_eq!(frame.caller_save_offset(0), -12);
        assert_eq!(frame.callee_save_offset(0), -24);
        assert_eq!(frame.ra_offset(), -28);
        assert_eq!(frame.words(), 9);
        // The outgoing area is the bottom of the frame, below $ra.
        assert_eq!(-(frame.words() as i32) * WORD_SIZE + Frame::arg_offset(5), -32);
        assert_eq!(Frame::param_offset(4), 4);
    }
}
