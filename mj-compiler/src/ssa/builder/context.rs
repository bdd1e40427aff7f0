use std::collections::{BTreeMap, HashMap};

use crate::ssa::{Op, Special, Statement, StmtId};
use crate::{CompileError, StructuralErrorKind};

/// Bindings captured at one nesting level: variable name to the value it had
/// before the level first reassigned it.
pub type Shadow = BTreeMap<String, StmtId>;

pub struct Gen {
    next_id: u32,
    pub body: Vec<Statement>,
    /// Current value of every local variable and parameter.
    pub locals: HashMap<String, StmtId>,
    /// Pre-assignment shadow for the innermost open if/while level.
    pub shadow: Option<Shadow>,
}

impl Gen {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            body: Vec::new(),
            locals: HashMap::new(),
            shadow: None,
        }
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Reset per-method tables. Statement ids keep counting across methods.
    pub fn begin_method(&mut self) {
        self.body.clear();
        self.locals.clear();
        self.shadow = None;
    }

    pub fn take_body(&mut self) -> Vec<Statement> {
        std::mem::take(&mut self.body)
    }

    pub fn emit(&mut self, op: Op) -> StmtId {
        self.emit_with(op, None, None, Special::None)
    }

    pub fn emit_with(
        &mut self,
        op: Op,
        left: Option<StmtId>,
        right: Option<StmtId>,
        special: Special,
    ) -> StmtId {
        let id = StmtId(self.next_id);
        self.next_id += 1;
        let mut stmt = Statement::new(id, op).with_special(special);
        stmt.left = left;
        stmt.right = right;
        self.body.push(stmt);
        id
    }

    /// Declare a new local; duplicate names are rejected.
    pub fn declare(&mut self, name: &str, value: StmtId) -> Result<(), CompileError> {
        if self.locals.contains_key(name) {
            return Err(CompileError::Structural {
                kind: StructuralErrorKind::DuplicateLocal,
                message: format!("duplicate local variable '{}'", name),
            });
        }
        self.locals.insert(name.to_string(), value);
        Ok(())
    }

    /// Rebind `name`, remembering its previous value in the open shadow table.
    pub fn rebind(&mut self, name: &str, value: StmtId) {
        if let Some(shadow) = self.shadow.as_mut() {
            if !shadow.contains_key(name) {
                if let Some(old) = self.locals.get(name) {
                    shadow.insert(name.to_string(), *old);
                }
            }
        }
        self.locals.insert(name.to_string(), value);
    }

    /// Open a fresh shadow level, returning the enclosing one.
    pub fn open_shadow(&mut self) -> Option<Shadow> {
        self.shadow.replace(Shadow::new())
    }

    /// Close the current level, reinstating `outer`, and return what it captured.
    pub fn close_shadow(&mut self, outer: Option<Shadow>) -> Shadow {
        std::mem::replace(&mut self.shadow, outer).unwrap_or_default()
    }

    /// Restore every captured variable to its pre-level value and return the
    /// values the level left behind.
    pub fn restore(&mut self, captured: &Shadow) -> BTreeMap<String, StmtId> {
        let mut latest = BTreeMap::new();
        for (name, old) in captured {
            if let Some(new) = self.locals.insert(name.clone(), *old) {
                latest.insert(name.clone(), new);
            }
        }
        latest
    }

    /// Merge a closed loop level into the enclosing one: each captured variable
    /// becomes `Unify(before, after)` and is rebound at the outer level.
    pub fn merge_up(&mut self, captured: Shadow) {
        for (name, old) in captured {
            let Some(&new) = self.locals.get(&name) else {
                continue;
            };
            let unify = self.emit_with(Op::Unify, Some(old), Some(new), Special::None);
            self.locals.insert(name.clone(), old);
            self.rebind(&name, unify);
        }
    }
}
