use super::context::Gen;
use crate::ast::{BinOp, Expr};
use crate::ssa::{CallSpec, Op, Special, StmtId};
use crate::{CompileError, StructuralErrorKind};

pub fn map_binop(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Plus,
        BinOp::Sub => Op::Minus,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::Lt => Op::Lt,
        BinOp::Le => Op::Le,
        BinOp::Gt => Op::Gt,
        BinOp::Ge => Op::Ge,
        BinOp::Eq => Op::Eq,
        BinOp::Ne => Op::Ne,
        BinOp::And => Op::And,
        BinOp::Or => Op::Or,
    }
}

impl Gen {
    /// Lower an expression post-order and return the statement holding its value.
    pub fn lower_expr(&mut self, expr: &Expr) -> Result<StmtId, CompileError> {
        let id = match expr {
            Expr::IntLit(n) => self.emit_with(Op::Int, None, None, Special::Int(*n)),
            Expr::BoolLit(b) => self.emit_with(Op::Boolean, None, None, Special::Bool(*b)),
            Expr::This => self.emit(Op::This),
            Expr::Var(name) => match self.locals.get(name) {
                Some(&value) => value,
                None => {
                    let this = self.emit(Op::This);
                    self.emit_with(Op::Member, Some(this), None, Special::Name(name.clone()))
                }
            },
            Expr::Binary { op, left, right } => {
                let l = self.lower_expr(left)?;
                let l = self.hold(l, right.has_assignment());
                let r = self.lower_expr(right)?;
                self.emit_with(map_binop(*op), Some(l), Some(r), Special::None)
            }
            Expr::Not(inner) => {
                let v = self.lower_expr(inner)?;
                self.emit_with(Op::Not, Some(v), None, Special::None)
            }
            Expr::Index { target, index } => {
                let t = self.lower_expr(target)?;
                let t = self.hold(t, index.has_assignment());
                let i = self.lower_expr(index)?;
                self.emit_with(Op::Index, Some(t), Some(i), Special::None)
            }
            Expr::Member { target, member } => {
                let t = self.lower_expr(target)?;
                self.emit_with(Op::Member, Some(t), None, Special::Name(member.clone()))
            }
            Expr::Call {
                target,
                method,
                args,
            } => self.lower_call(target, method, args)?,
            Expr::NewObject(class) => {
                self.emit_with(Op::NewObj, None, None, Special::Name(class.clone()))
            }
            Expr::NewIntArray(size) => {
                let s = self.lower_expr(size)?;
                self.emit_with(Op::NewIntArray, Some(s), None, Special::None)
            }
            Expr::Assign { target, value } => self.lower_assign(target, value)?,
        };
        Ok(id)
    }

    fn lower_call(
        &mut self,
        target: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Result<StmtId, CompileError> {
        let t = self.lower_expr(target)?;
        let t = self.hold(t, args.iter().any(Expr::has_assignment));
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let v = self.lower_expr(arg)?;
            values.push(self.hold(v, args[i + 1..].iter().any(Expr::has_assignment)));
        }

        // Args go out back to back so nothing runs between them and the call.
        let arg_ids = values
            .into_iter()
            .enumerate()
            .map(|(position, v)| self.emit_with(Op::Arg, Some(v), None, Special::Position(position)))
            .collect();

        Ok(self.emit_with(
            Op::Call,
            Some(t),
            None,
            Special::Call(CallSpec {
                method: method.to_string(),
                args: arg_ids,
            }),
        ))
    }

    /// Copy `value` out of its local when a sibling evaluated later may
    /// rebind that local. A join ties a local's old and new bindings to one
    /// register, so a plain reference would observe the new value.
    fn hold(&mut self, value: StmtId, rebinds_later: bool) -> StmtId {
        if !rebinds_later {
            return value;
        }
        let Some(name) = self
            .locals
            .iter()
            .find(|(_, bound)| **bound == value)
            .map(|(name, _)| name.clone())
        else {
            return value;
        };
        self.emit_with(Op::VarAssg, Some(value), Some(value), Special::Name(name))
    }

    /// Assignment evaluates to the assigned value.
    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> Result<StmtId, CompileError> {
        match target {
            Expr::Var(name) => match self.locals.get(name).copied() {
                Some(old) => {
                    let v = self.lower_expr(value)?;
                    let assg =
                        self.emit_with(Op::VarAssg, Some(v), Some(old), Special::Name(name.clone()));
                    self.rebind(name, assg);
                    Ok(v)
                }
                None => {
                    let this = self.emit(Op::This);
                    let v = self.lower_expr(value)?;
                    self.emit_with(
                        Op::MemberAssg,
                        Some(this),
                        Some(v),
                        Special::Name(name.clone()),
                    );
                    Ok(v)
                }
            },
            Expr::Member { target, member } => {
                let t = self.lower_expr(target)?;
                let t = self.hold(t, value.has_assignment());
                let v = self.lower_expr(value)?;
                self.emit_with(
                    Op::MemberAssg,
                    Some(t),
                    Some(v),
                    Special::Name(member.clone()),
                );
                Ok(v)
            }
            Expr::Index { target, index } => {
                let t = self.lower_expr(target)?;
                let t = self.hold(t, index.has_assignment() || value.has_assignment());
                let i = self.lower_expr(index)?;
                let i = self.hold(i, value.has_assignment());
                let v = self.lower_expr(value)?;
                self.emit_with(Op::IndexAssg, Some(t), Some(v), Special::Index(i));
                Ok(v)
            }
            _ => Err(CompileError::Structural {
                kind: StructuralErrorKind::InvalidAssignmentTarget,
                message: "left-hand side of an assignment must be a variable, field or array element"
                    .to_string(),
            }),
        }
    }
}
