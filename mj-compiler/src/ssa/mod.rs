//! Linear single-assignment IR.
//!
//! A method body is a flat `Vec<Statement>`; operands refer to earlier
//! statements by [`StmtId`]. Control flow is explicit `Label`/`Goto`/`Branch`
//! statements, and values of one source variable that reach a join along
//! different paths are tied together by `Unify`.

pub mod builder;
pub mod stmt;

use std::collections::HashMap;
use std::fmt;

use crate::ast::{Param, TypeName};
use crate::types::{TypeDisplay, TypeId, TypeTable};

pub use builder::build_program;
pub use stmt::{CallSpec, Op, Pin, Special, Statement, StmtId};

#[derive(Debug, Clone)]
pub struct SsaField {
    pub name: String,
    pub decl: TypeName,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone)]
pub struct SsaMethod {
    pub name: String,
    /// Owning class; `None` for the program entry.
    pub class: Option<String>,
    pub params: Vec<Param>,
    pub ret_decl: Option<TypeName>,
    pub body: Vec<Statement>,
    pub param_types: Vec<TypeId>,
    pub ret_type: Option<TypeId>,
}

impl SsaMethod {
    pub fn is_main(&self) -> bool {
        self.class.is_none()
    }

    /// Label name to its position in `body`.
    pub fn labels(&self) -> HashMap<String, usize> {
        self.body
            .iter()
            .enumerate()
            .filter(|(_, s)| s.op == Op::Label)
            .filter_map(|(i, s)| s.label().map(|l| (l.to_string(), i)))
            .collect()
    }

    /// Statement id to its position in `body`.
    pub fn positions(&self) -> HashMap<StmtId, usize> {
        self.body
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect()
    }

    pub fn find(&self, id: StmtId) -> Option<&Statement> {
        self.body.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct SsaClass {
    pub name: String,
    pub extends: Option<String>,
    pub fields: Vec<SsaField>,
    pub methods: Vec<SsaMethod>,
}

impl SsaClass {
    pub fn field(&self, name: &str) -> Option<&SsaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&SsaMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct SsaProgram {
    pub main: SsaMethod,
    pub classes: Vec<SsaClass>,
    /// Filled in by the type checker.
    pub types: TypeTable,
    next_id: u32,
}

impl SsaProgram {
    pub fn new(main: SsaMethod, classes: Vec<SsaClass>, next_id: u32) -> Self {
        Self {
            main,
            classes,
            types: TypeTable::new(),
            next_id,
        }
    }

    pub fn class(&self, name: &str) -> Option<&SsaClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn fresh_id(&mut self) -> StmtId {
        let id = StmtId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The next id that [`fresh_id`](Self::fresh_id) would hand out.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn set_next_id(&mut self, next: u32) {
        self.next_id = self.next_id.max(next);
    }

    pub fn methods(&self) -> impl Iterator<Item = &SsaMethod> {
        std::iter::once(&self.main).chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut SsaMethod> {
        std::iter::once(&mut self.main)
            .chain(self.classes.iter_mut().flat_map(|c| c.methods.iter_mut()))
    }

    /// Render one statement as `<id>[(<reg>)]: <Op>[ l][ r][ *special][ :type]`.
    pub fn statement_line(&self, stmt: &Statement) -> String {
        let mut line = stmt.id.to_string();
        if let Some(reg) = stmt.register {
            line.push_str(&format!("({})", reg));
        }
        line.push_str(&format!(": {}", stmt.op));
        if let Some(l) = stmt.left {
            line.push_str(&format!(" {}", l));
        }
        if let Some(r) = stmt.right {
            line.push_str(&format!(" {}", r));
        }
        if stmt.special != Special::None {
            line.push_str(&format!(" *{}", stmt.special));
        }
        if let Some(ty) = stmt.ty {
            line.push_str(&format!(" :{}", TypeDisplay(&self.types, ty)));
        }
        line
    }

    /// The textual dump, one line per entry.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec!["program:".to_string(), "  main:".to_string()];
        self.method_lines(&self.main, &mut lines);
        for class in &self.classes {
            lines.push(format!("  class {}:", class.name));
            for method in &class.methods {
                self.method_lines(method, &mut lines);
            }
        }
        lines
    }

    fn method_lines(&self, method: &SsaMethod, out: &mut Vec<String>) {
        out.push(format!("    method {}:", method.name));
        for stmt in &method.body {
            out.push(format!("      {}", self.statement_line(stmt)));
        }
    }
}

impl fmt::Display for SsaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
