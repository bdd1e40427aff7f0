use std::collections::BTreeSet;

use tracing::debug;

use super::context::Gen;
use crate::ast::{Expr, MainClass, MethodDecl, NodeId, Stmt};
use crate::ssa::{Op, Special, SsaMethod};
use crate::CompileError;

impl Gen {
    // ========== Methods ==========

    pub fn lower_main(&mut self, main: &MainClass) -> Result<SsaMethod, CompileError> {
        self.begin_method();
        self.lower_stmt(&main.body)?;
        debug!(statements = self.body.len(), "built main");

        Ok(SsaMethod {
            name: "main".to_string(),
            class: None,
            params: Vec::new(),
            ret_decl: None,
            body: self.take_body(),
            param_types: Vec::new(),
            ret_type: None,
        })
    }

    pub fn lower_method(
        &mut self,
        class: &str,
        method: &MethodDecl,
    ) -> Result<SsaMethod, CompileError> {
        self.begin_method();

        let mut incoming = Vec::with_capacity(method.params.len());
        for (position, param) in method.params.iter().enumerate() {
            let id = self.emit_with(Op::Parameter, None, None, Special::Position(position));
            self.declare(&param.name, id)?;
            incoming.push(id);
        }
        // Parameters are copied out of their incoming location right away so the
        // argument registers are free for the rest of the body.
        for (param, id) in method.params.iter().zip(incoming) {
            let local = self.emit_with(
                Op::VarAssg,
                Some(id),
                Some(id),
                Special::Name(param.name.clone()),
            );
            self.locals.insert(param.name.clone(), local);
        }

        for var in &method.locals {
            let id = self.emit_with(Op::Null, None, None, Special::Type(var.ty.clone()));
            self.declare(&var.name, id)?;
        }

        for stmt in &method.body {
            self.lower_stmt(stmt)?;
        }
        let ret = self.lower_expr(&method.ret)?;
        self.emit_with(Op::Return, Some(ret), None, Special::None);

        debug!(
            class,
            method = %method.name,
            statements = self.body.len(),
            "built method"
        );

        Ok(SsaMethod {
            name: method.name.clone(),
            class: Some(class.to_string()),
            params: method.params.clone(),
            ret_decl: Some(method.ret_ty.clone()),
            body: self.take_body(),
            param_types: Vec::new(),
            ret_type: None,
        })
    }

    // ========== Statements ==========

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.lower_stmt(s)?;
                }
            }
            Stmt::If {
                id,
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(*id, condition, then_branch, else_branch.as_deref())?,
            Stmt::While {
                id,
                condition,
                body,
            } => self.lower_while(*id, condition, body)?,
            Stmt::Print(value) => {
                let v = self.lower_expr(value)?;
                self.emit_with(Op::Print, Some(v), None, Special::None);
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        id: NodeId,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), CompileError> {
        let else_label = format!("lif_{}_else", id);
        let done_label = format!("lif_{}_done", id);

        let cond = self.lower_expr(condition)?;
        self.emit_with(
            Op::NBranch,
            Some(cond),
            None,
            Special::Label(else_label.clone()),
        );

        let outer = self.open_shadow();
        self.lower_stmt(then_branch)?;
        self.emit_with(Op::Goto, None, None, Special::Label(done_label.clone()));
        self.emit_with(Op::Label, None, None, Special::Label(else_label));

        let then_captured = self.close_shadow(None);
        let then_values = self.restore(&then_captured);

        self.shadow = Some(Default::default());
        if let Some(else_branch) = else_branch {
            self.lower_stmt(else_branch)?;
        }
        self.emit_with(Op::Label, None, None, Special::Label(done_label));

        let else_captured = self.close_shadow(outer);
        let else_values = self.restore(&else_captured);

        let touched: BTreeSet<&String> = then_values.keys().chain(else_values.keys()).collect();
        for name in touched {
            let Some(&before) = self.locals.get(name.as_str()) else {
                continue;
            };
            let t = then_values.get(name).copied().unwrap_or(before);
            let e = else_values.get(name).copied().unwrap_or(before);
            let unify = self.emit_with(Op::Unify, Some(t), Some(e), Special::None);
            self.rebind(name, unify);
        }
        Ok(())
    }

    fn lower_while(
        &mut self,
        id: NodeId,
        condition: &Expr,
        body: &Stmt,
    ) -> Result<(), CompileError> {
        let start_label = format!("lwhile_{}_start", id);
        let end_label = format!("lwhile_{}_end", id);

        // Two levels: one around the condition, one around the body.
        let outer = self.open_shadow();
        self.emit_with(Op::Label, None, None, Special::Label(start_label.clone()));
        let cond = self.lower_expr(condition)?;

        let cond_level = self.open_shadow();
        self.emit_with(Op::NBranch, Some(cond), None, Special::Label(end_label.clone()));
        self.lower_stmt(body)?;
        self.emit_with(Op::Goto, None, None, Special::Label(start_label));
        self.emit_with(Op::Label, None, None, Special::Label(end_label));

        let cond_is_empty = cond_level.as_ref().map_or(true, |s| s.is_empty());
        if cond_is_empty {
            let body_captured = self.close_shadow(outer);
            self.merge_up(body_captured);
        } else {
            let body_captured = self.close_shadow(cond_level);
            self.merge_up(body_captured);
            let cond_captured = self.close_shadow(outer);
            self.merge_up(cond_captured);
        }
        Ok(())
    }
}
