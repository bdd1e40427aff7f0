//! Code generation driver and assembly output.
//!
//! Contains the [`Codegen`] struct, which walks register-allocated SSA one
//! method at a time, plus the fixed runtime prelude and the vtable data
//! section.

mod frame;
mod lowering;

pub use frame::Frame;

use std::collections::HashMap;

use tracing::debug;

use super::abi::Register;
use super::instruction::{AluOp, AsmItem, MipsInstr};
use super::layout;
use crate::ssa::{SsaMethod, SsaProgram, Statement, StmtId};
use crate::CompileError;

// ============================================================================
// Output type
// ============================================================================

/// Final MIPS assembly.
#[derive(Debug, Clone)]
pub struct MipsAsm {
    pub items: Vec<AsmItem>,
}

impl MipsAsm {
    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(|i| i.to_string()).collect()
    }

    pub fn join(&self) -> String {
        let mut text = self.lines().join("\n");
        text.push('\n');
        text
    }
}

// ============================================================================
// Naming
// ============================================================================

pub const MAIN_LABEL: &str = "mj_main";
pub const RT_NEW: &str = "minijavaNew";
pub const RT_NEW_ARRAY: &str = "minijavaNewArray";
pub const RT_PRINT: &str = "minijavaPrint";

pub fn vtable_label(class: &str) -> String {
    format!("mj__v_{}", class)
}

pub fn method_label(class: &str, method: &str) -> String {
    format!("mj__m_{}_{}", class, method)
}

fn mangled(method: &SsaMethod) -> String {
    match &method.class {
        Some(class) => method_label(class, &method.name),
        None => MAIN_LABEL.to_string(),
    }
}

// ============================================================================
// Codegen state
// ============================================================================

/// Per-method state used while lowering statements.
pub(crate) struct MethodCtx<'m> {
    pub mangled: String,
    pub frame: Frame,
    pub stmts: HashMap<StmtId, &'m Statement>,
}

pub struct Codegen<'p> {
    pub(crate) program: &'p SsaProgram,
    pub(crate) out: Vec<AsmItem>,
}

impl<'p> Codegen<'p> {
    pub fn new(program: &'p SsaProgram) -> Self {
        Self {
            program,
            out: Vec::new(),
        }
    }

    // ── Item emission helpers ───────────────────────────────────────────

    pub(crate) fn push_asm(&mut self, instr: MipsInstr) {
        self.out.push(instr.into());
    }

    pub(crate) fn push_commented(&mut self, instr: MipsInstr, comment: impl Into<String>) {
        self.out.push(AsmItem::Instr {
            instr,
            comment: Some(comment.into()),
        });
    }

    pub(crate) fn push_label(&mut self, name: impl Into<String>) {
        self.out.push(AsmItem::Label(name.into()));
    }

    fn directive(&mut self, d: impl Into<String>) {
        self.out.push(AsmItem::Directive(d.into()));
    }

    // ── Program ─────────────────────────────────────────────────────────

    pub fn emit_program(mut self) -> Result<MipsAsm, CompileError> {
        self.emit_vtables();
        self.emit_runtime();

        let program = self.program;
        self.emit_method(&program.main)?;
        for class in &program.classes {
            for method in &class.methods {
                self.emit_method(method)?;
            }
        }
        Ok(MipsAsm { items: self.out })
    }

    fn emit_vtables(&mut self) {
        self.directive(".data");
        self.directive(".align 2");
        let program = self.program;
        for class in &program.classes {
            let entries = layout::vtable(program, &class.name);
            let words = if entries.is_empty() {
                "0".to_string()
            } else {
                entries
                    .iter()
                    .map(|e| method_label(&e.class, &e.method))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            self.push_label(vtable_label(&class.name));
            self.directive(format!(".word {}", words));
        }
        self.out.push(AsmItem::Blank);
    }

    /// Entry point and the three runtime services.
    fn emit_runtime(&mut self) {
        use MipsInstr::*;
        use Register::*;

        self.directive(".text");
        self.directive(".globl main");
        self.push_label("main");
        self.push_asm(Jal {
            label: MAIN_LABEL.to_string(),
        });
        self.push_asm(Li { d: V0, imm: 10 });
        self.push_commented(Syscall, "exit");
        self.out.push(AsmItem::Blank);

        // $a0 = vtable, $a1 = size in bytes
        self.push_label(RT_NEW);
        self.push_asm(MipsInstr::mov(V1, A0));
        self.push_asm(MipsInstr::mov(A0, A1));
        self.push_asm(Li { d: V0, imm: 9 });
        self.push_commented(Syscall, "sbrk");
        self.push_asm(Sw {
            s: V1,
            offset: 0,
            base: V0,
        });
        self.push_asm(Jr { r: Ra });
        self.out.push(AsmItem::Blank);

        // $a0 = element count
        self.push_label(RT_NEW_ARRAY);
        self.push_asm(MipsInstr::mov(V1, A0));
        self.push_asm(AluImm {
            op: AluOp::Mul,
            d: A0,
            a: A0,
            imm: 4,
        });
        self.push_asm(AluImm {
            op: AluOp::Add,
            d: A0,
            a: A0,
            imm: 4,
        });
        self.push_asm(Li { d: V0, imm: 9 });
        self.push_commented(Syscall, "sbrk");
        self.push_asm(Sw {
            s: V1,
            offset: 0,
            base: V0,
        });
        self.push_asm(Jr { r: Ra });
        self.out.push(AsmItem::Blank);

        // $a0 = value
        self.push_label(RT_PRINT);
        self.push_asm(Li { d: V0, imm: 1 });
        self.push_commented(Syscall, "print_int");
        self.push_asm(Li { d: V0, imm: 11 });
        self.push_asm(Li { d: A0, imm: 10 });
        self.push_commented(Syscall, "print_char");
        self.push_asm(Jr { r: Ra });
        self.out.push(AsmItem::Blank);
    }

    // ── Methods ─────────────────────────────────────────────────────────

    fn emit_method(&mut self, method: &SsaMethod) -> Result<(), CompileError> {
        let ctx = MethodCtx {
            mangled: mangled(method),
            frame: Frame::for_method(method),
            stmts: method.body.iter().map(|s| (s.id, s)).collect(),
        };

        self.push_label(ctx.mangled.clone());
        self.emit_prologue(&ctx.frame);
        for stmt in &method.body {
            self.emit_stmt(stmt, &ctx)?;
        }
        self.push_label(format!("{}_ret", ctx.mangled));
        self.emit_epilogue(&ctx.frame);
        self.out.push(AsmItem::Blank);

        debug!(method = %ctx.mangled, frame_words = ctx.frame.words(), "emitted");
        Ok(())
    }

    fn emit_prologue(&mut self, frame: &Frame) {
        for instr in MipsInstr::push(Register::Fp) {
            self.push_asm(instr);
        }
        self.push_asm(MipsInstr::mov(Register::Fp, Register::Sp));
        self.push_asm(MipsInstr::bump_sp(-(frame.words() as i32) * super::abi::WORD_SIZE));
        self.push_asm(MipsInstr::Sw {
            s: Register::Ra,
            offset: frame.ra_offset(),
            base: Register::Fp,
        });
        for (i, &r) in frame.callee_saved_regs().iter().enumerate() {
            self.push_asm(MipsInstr::Sw {
                s: r,
                offset: frame.callee_save_offset(i),
                base: Register::Fp,
            });
        }
    }

    fn emit_epilogue(&mut self, frame: &Frame) {
        for (i, &r) in frame.callee_saved_regs().iter().enumerate() {
            self.push_asm(MipsInstr::Lw {
                d: r,
                offset: frame.callee_save_offset(i),
                base: Register::Fp,
            });
        }
        self.push_asm(MipsInstr::Lw {
            d: Register::Ra,
            offset: frame.ra_offset(),
            base: Register::Fp,
        });
        self.push_asm(MipsInstr::mov(Register::Sp, Register::Fp));
        for instr in MipsInstr::pop(Register::Fp) {
            self.push_asm(instr);
        }
        self.push_asm(MipsInstr::Jr { r: Register::Ra });
    }
}

/// Lower an allocated program to assembly.
pub fn emit_program(program: &SsaProgram) -> Result<MipsAsm, CompileError> {
    Codegen::new(program).emit_program()
}
