//! SSA statement → MIPS lowering.
//!
//! Implements `Codegen::emit_stmt`, which translates one allocated statement
//! into typed machine instructions. Every value-producing statement already
//! has a register; spill traffic is explicit `Load`/`Store` statements.

use super::{vtable_label, Codegen, Frame, MethodCtx, RT_NEW, RT_NEW_ARRAY, RT_PRINT};
use crate::backend::abi::{Register, WORD_SIZE};
use crate::backend::instruction::{AluOp, MipsInstr};
use crate::backend::layout;
use crate::ssa::{Op, Special, Statement, StmtId};
use crate::types::{TypeId, INT_ARRAY};
use crate::CompileError;

fn codegen_error(stmt: &Statement, message: impl std::fmt::Display) -> CompileError {
    CompileError::Codegen(format!("statement {} ({}): {}", stmt.id, stmt.op, message))
}

fn alu_for(op: Op) -> Option<AluOp> {
    Some(match op {
        Op::Plus => AluOp::Add,
        Op::Minus => AluOp::Sub,
        Op::Mul => AluOp::Mul,
        Op::Lt => AluOp::Slt,
        Op::Le => AluOp::Sle,
        Op::Gt => AluOp::Sgt,
        Op::Ge => AluOp::Sge,
        _ => return None,
    })
}

impl<'p> Codegen<'p> {
    // ── Operand access ──────────────────────────────────────────────────

    fn reg_of(&self, ctx: &MethodCtx, id: StmtId) -> Result<Register, CompileError> {
        let stmt = ctx
            .stmts
            .get(&id)
            .ok_or_else(|| CompileError::Codegen(format!("statement {} is not in this method", id)))?;
        stmt.register
            .and_then(Register::for_color)
            .ok_or_else(|| codegen_error(stmt, "value has no register"))
    }

    fn left(&self, ctx: &MethodCtx, stmt: &Statement) -> Result<Register, CompileError> {
        let id = stmt.left.ok_or_else(|| codegen_error(stmt, "missing left operand"))?;
        self.reg_of(ctx, id)
    }

    fn right(&self, ctx: &MethodCtx, stmt: &Statement) -> Result<Register, CompileError> {
        let id = stmt.right.ok_or_else(|| codegen_error(stmt, "missing right operand"))?;
        self.reg_of(ctx, id)
    }

    fn dest(&self, stmt: &Statement) -> Result<Register, CompileError> {
        stmt.register
            .and_then(Register::for_color)
            .ok_or_else(|| codegen_error(stmt, "result has no register"))
    }

    fn operand_type(&self, ctx: &MethodCtx, id: Option<StmtId>) -> Option<TypeId> {
        id.and_then(|id| ctx.stmts.get(&id)).and_then(|s| s.ty)
    }

    /// Class named by the static type of `stmt.left`.
    fn target_class(&self, ctx: &MethodCtx, stmt: &Statement) -> Result<String, CompileError> {
        let ty = self
            .operand_type(ctx, stmt.left)
            .ok_or_else(|| codegen_error(stmt, "target has no type"))?;
        let name = self.program.types.name(ty).to_string();
        if self.program.class(&name).is_none() {
            return Err(codegen_error(stmt, format!("'{}' is not a class", name)));
        }
        Ok(name)
    }

    // ── Caller-saved registers ──────────────────────────────────────────

    fn save_caller(&mut self, frame: &Frame, keep: Option<Register>) {
        for (i, &r) in frame.caller_saved_regs().iter().enumerate() {
            if Some(r) != keep {
                self.push_asm(MipsInstr::Sw {
                    s: r,
                    offset: frame.caller_save_offset(i),
                    base: Register::Fp,
                });
            }
        }
    }

    fn restore_caller(&mut self, frame: &Frame, keep: Option<Register>) {
        for (i, &r) in frame.caller_saved_regs().iter().enumerate() {
            if Some(r) != keep {
                self.push_asm(MipsInstr::Lw {
                    d: r,
                    offset: frame.caller_save_offset(i),
                    base: Register::Fp,
                });
            }
        }
    }

    /// `jal` to a runtime service with caller-saved registers preserved;
    /// `setup` loads the argument registers after the save.
    fn runtime_call(
        &mut self,
        frame: &Frame,
        service: &str,
        dest: Option<Register>,
        setup: Vec<MipsInstr>,
    ) {
        self.save_caller(frame, dest);
        for instr in setup {
            self.push_asm(instr);
        }
        self.push_asm(MipsInstr::Jal {
            label: service.to_string(),
        });
        if let Some(d) = dest {
            self.push_asm(MipsInstr::mov(d, Register::RESULT));
        }
        self.restore_caller(frame, dest);
    }

    /// `$v1 = base + 4 + 4 * index`
    fn element_address(&mut self, base: Register, index: Register) {
        let s = Register::SCRATCH;
        self.push_asm(MipsInstr::AluImm {
            op: AluOp::Mul,
            d: s,
            a: index,
            imm: WORD_SIZE,
        });
        self.push_asm(MipsInstr::AluImm {
            op: AluOp::Add,
            d: s,
            a: s,
            imm: WORD_SIZE,
        });
        self.push_asm(MipsInstr::Alu {
            op: AluOp::Add,
            d: s,
            a: s,
            b: base,
        });
    }

    fn move_if_needed(&mut self, d: Register, s: Register) {
        if d != s {
            self.push_asm(MipsInstr::mov(d, s));
        }
    }

    fn label_of(&self, ctx: &MethodCtx, stmt: &Statement) -> Result<String, CompileError> {
        stmt.label()
            .map(|l| format!("{}_{}", ctx.mangled, l))
            .ok_or_else(|| codegen_error(stmt, "missing label"))
    }

    // ── Statements ──────────────────────────────────────────────────────

    pub(crate) fn emit_stmt(&mut self, stmt: &Statement, ctx: &MethodCtx) -> Result<(), CompileError> {
        let frame = &ctx.frame;
        match stmt.op {
            // Members of one variable already share a register.
            Op::Unify | Op::Alias => {}

            Op::This => {
                let d = self.dest(stmt)?;
                self.push_asm(MipsInstr::mov(d, Register::THIS));
            }
            Op::Parameter => {
                let d = self.dest(stmt)?;
                let position = stmt
                    .position()
                    .ok_or_else(|| codegen_error(stmt, "missing position"))?;
                match Register::ARG_REGS.get(position) {
                    Some(&incoming) => self.move_if_needed(d, incoming),
                    None => self.push_commented(
                        MipsInstr::Lw {
                            d,
                            offset: Frame::param_offset(position),
                            base: Register::Fp,
                        },
                        format!("parameter {}", position),
                    ),
                }
            }
            Op::Arg => {
                let value = self.left(ctx, stmt)?;
                let position = stmt
                    .position()
                    .ok_or_else(|| codegen_error(stmt, "missing position"))?;
                match Register::ARG_REGS.get(position) {
                    Some(&outgoing) => self.move_if_needed(outgoing, value),
                    None => self.push_commented(
                        MipsInstr::Sw {
                            s: value,
                            offset: Frame::arg_offset(position),
                            base: Register::Sp,
                        },
                        format!("argument {}", position),
                    ),
                }
            }
            Op::Null => {
                let d = self.dest(stmt)?;
                self.push_asm(MipsInstr::mov(d, Register::Zero));
            }
            Op::Int => {
                let d = self.dest(stmt)?;
                let imm = match stmt.special {
                    Special::Int(n) => n,
                    _ => return Err(codegen_error(stmt, "missing constant")),
                };
                self.push_asm(MipsInstr::Li { d, imm });
            }
            Op::Boolean => {
                let d = self.dest(stmt)?;
                let imm = match stmt.special {
                    Special::Bool(b) => i32::from(b),
                    _ => return Err(codegen_error(stmt, "missing constant")),
                };
                self.push_asm(MipsInstr::Li { d, imm });
            }
            Op::NewObj => {
                let d = self.dest(stmt)?;
                let class = stmt.name().ok_or_else(|| codegen_error(stmt, "missing class"))?;
                let words = layout::object_size(self.program, class)
                    .ok_or_else(|| codegen_error(stmt, format!("unknown class '{}'", class)))?;
                let setup = vec![
                    MipsInstr::La {
                        d: Register::A0,
                        label: vtable_label(class),
                    },
                    MipsInstr::Li {
                        d: Register::A1,
                        imm: words as i32 * WORD_SIZE,
                    },
                ];
                self.runtime_call(frame, RT_NEW, Some(d), setup);
            }
            Op::NewIntArray => {
                let d = self.dest(stmt)?;
                let size = self.left(ctx, stmt)?;
                let setup = vec![MipsInstr::mov(Register::A0, size)];
                self.runtime_call(frame, RT_NEW_ARRAY, Some(d), setup);
            }
            Op::Print => {
                let value = self.left(ctx, stmt)?;
                let setup = vec![MipsInstr::mov(Register::A0, value)];
                self.runtime_call(frame, RT_PRINT, None, setup);
            }

            Op::Label => {
                let label = self.label_of(ctx, stmt)?;
                self.push_label(label);
            }
            Op::Goto => {
                let label = self.label_of(ctx, stmt)?;
                self.push_asm(MipsInstr::J { label });
            }
            Op::Branch | Op::NBranch => {
                let label = self.label_of(ctx, stmt)?;
                let a = self.left(ctx, stmt)?;
                let b = Register::Zero;
                self.push_asm(if stmt.op == Op::Branch {
                    MipsInstr::Bne { a, b, label }
                } else {
                    MipsInstr::Beq { a, b, label }
                });
            }
            Op::Call => {
                let d = self.dest(stmt).ok();
                let target = self.left(ctx, stmt)?;
                let call = stmt.call().ok_or_else(|| codegen_error(stmt, "missing call"))?;
                let class = self.target_class(ctx, stmt)?;
                let slot = layout::method_slot(self.program, &class, &call.method).ok_or_else(|| {
                    codegen_error(stmt, format!("'{}' has no method '{}'", class, call.method))
                })?;

                self.save_caller(frame, d);
                self.push_asm(MipsInstr::mov(Register::THIS, target));
                self.push_asm(MipsInstr::Lw {
                    d: Register::SCRATCH,
                    offset: 0,
                    base: Register::THIS,
                });
                self.push_asm(MipsInstr::Lw {
                    d: Register::SCRATCH,
                    offset: slot as i32 * WORD_SIZE,
                    base: Register::SCRATCH,
                });
                self.push_commented(
                    MipsInstr::Jalr {
                        r: Register::SCRATCH,
                    },
                    format!("{}.{}", class, call.method),
                );
                if let Some(d) = d {
                    self.push_asm(MipsInstr::mov(d, Register::RESULT));
                }
                self.restore_caller(frame, d);
            }
            Op::Return => {
                let value = self.left(ctx, stmt)?;
                self.push_asm(MipsInstr::mov(Register::RESULT, value));
                self.push_asm(MipsInstr::J {
                    label: format!("{}_ret", ctx.mangled),
                });
            }

            Op::Member => {
                let d = self.dest(stmt)?;
                let target = self.left(ctx, stmt)?;
                let field = stmt.name().ok_or_else(|| codegen_error(stmt, "missing field"))?;
                let offset = if self.operand_type(ctx, stmt.left) == Some(INT_ARRAY) {
                    if field != "length" {
                        return Err(codegen_error(stmt, format!("int[] has no field '{}'", field)));
                    }
                    0
                } else {
                    let class = self.target_class(ctx, stmt)?;
                    layout::field_offset(self.program, &class, field).ok_or_else(|| {
                        codegen_error(stmt, format!("'{}' has no field '{}'", class, field))
                    })?
                };
                self.push_asm(MipsInstr::Lw {
                    d,
                    offset,
                    base: target,
                });
            }
            Op::Index => {
                let d = self.dest(stmt)?;
                let base = self.left(ctx, stmt)?;
                let index = self.right(ctx, stmt)?;
                self.element_address(base, index);
                self.push_asm(MipsInstr::Lw {
                    d,
                    offset: 0,
                    base: Register::SCRATCH,
                });
            }
            Op::Store => {
                let value = self.left(ctx, stmt)?;
                let Special::Slot(slot) = stmt.special else {
                    return Err(codegen_error(stmt, "missing slot"));
                };
                self.push_commented(
                    MipsInstr::Sw {
                        s: value,
                        offset: frame.spill_offset(slot),
                        base: Register::Fp,
                    },
                    format!("spill {}", slot),
                );
            }
            Op::Load => {
                let d = self.dest(stmt)?;
                let Special::Slot(slot) = stmt.special else {
                    return Err(codegen_error(stmt, "missing slot"));
                };
                self.push_commented(
                    MipsInstr::Lw {
                        d,
                        offset: frame.spill_offset(slot),
                        base: Register::Fp,
                    },
                    format!("reload {}", slot),
                );
            }
            Op::VarAssg => {
                let d = self.dest(stmt)?;
                let value = self.left(ctx, stmt)?;
                self.move_if_needed(d, value);
            }
            Op::MemberAssg => {
                let target = self.left(ctx, stmt)?;
                let value = self.right(ctx, stmt)?;
                let field = stmt.name().ok_or_else(|| codegen_error(stmt, "missing field"))?;
                let class = self.target_class(ctx, stmt)?;
                let offset = layout::field_offset(self.program, &class, field).ok_or_else(|| {
                    codegen_error(stmt, format!("'{}' has no field '{}'", class, field))
                })?;
                self.push_asm(MipsInstr::Sw {
                    s: value,
                    offset,
                    base: target,
                });
            }
            Op::IndexAssg => {
                let base = self.left(ctx, stmt)?;
                let value = self.right(ctx, stmt)?;
                let Special::Index(index) = stmt.special else {
                    return Err(codegen_error(stmt, "missing index"));
                };
                let index = self.reg_of(ctx, index)?;
                self.element_address(base, index);
                self.push_asm(MipsInstr::Sw {
                    s: value,
                    offset: 0,
                    base: Register::SCRATCH,
                });
            }

            Op::Not => {
                let d = self.dest(stmt)?;
                let value = self.left(ctx, stmt)?;
                self.push_asm(MipsInstr::Alu {
                    op: AluOp::Seq,
                    d,
                    a: Register::Zero,
                    b: value,
                });
            }
            Op::And | Op::Or => {
                let d = self.dest(stmt)?;
                let a = self.left(ctx, stmt)?;
                let b = self.right(ctx, stmt)?;
                self.push_asm(MipsInstr::Alu {
                    op: AluOp::Add,
                    d,
                    a,
                    b,
                });
                let (op, imm) = if stmt.op == Op::And {
                    (AluOp::Seq, 2)
                } else {
                    (AluOp::Sne, 0)
                };
                self.push_asm(MipsInstr::AluImm { op, d, a: d, imm });
            }
            Op::Eq | Op::Ne => {
                let d = self.dest(stmt)?;
                let kinds = (
                    self.operand_type(ctx, stmt.left),
                    self.operand_type(ctx, stmt.right),
                );
                let same_kind = match kinds {
                    (Some(l), Some(r)) => self.program.types.kind(l) == self.program.types.kind(r),
                    _ => true,
                };
                if same_kind {
                    let a = self.left(ctx, stmt)?;
                    let b = self.right(ctx, stmt)?;
                    let op = if stmt.op == Op::Eq { AluOp::Seq } else { AluOp::Sne };
                    self.push_asm(MipsInstr::Alu { op, d, a, b });
                } else {
                    let imm = i32::from(stmt.op == Op::Ne);
                    self.push_commented(MipsInstr::Li { d, imm }, "operands of different kinds");
                }
            }
            Op::Div | Op::Mod => {
                let d = self.dest(stmt)?;
                let a = self.left(ctx, stmt)?;
                let b = self.right(ctx, stmt)?;
                self.push_asm(MipsInstr::Div { a, b });
                self.push_asm(if stmt.op == Op::Div {
                    MipsInstr::Mflo { d }
                } else {
                    MipsInstr::Mfhi { d }
                });
            }
            Op::Plus | Op::Minus | Op::Mul | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let d = self.dest(stmt)?;
                let a = self.left(ctx, stmt)?;
                let b = self.right(ctx, stmt)?;
                let op = alu_for(stmt.op).ok_or_else(|| codegen_error(stmt, "not an ALU op"))?;
                self.push_asm(MipsInstr::Alu { op, d, a, b });
            }
        }
        Ok(())
    }
}
