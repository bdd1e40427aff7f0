//! Syntax tree to SSA lowering.
//!
//! Each method is walked once. Locals map to the statement currently holding
//! their value; `if` and `while` open shadow levels that remember the value a
//! variable had before the level reassigned it, so the join can emit `Unify`.

pub mod context;
pub mod expr;
pub mod stmt;

use std::collections::HashSet;

use crate::ast::Program;
use crate::ssa::{SsaClass, SsaField, SsaProgram};
use crate::{CompileError, StructuralErrorKind};

pub use context::Gen;

/// Entry point for lowering a whole program.
pub fn build_program(program: &Program) -> Result<SsaProgram, CompileError> {
    let mut g = Gen::new();
    let main = g.lower_main(&program.main)?;

    let mut seen_classes = HashSet::new();
    let mut classes = Vec::with_capacity(program.classes.len());
    for decl in &program.classes {
        if !seen_classes.insert(decl.name.as_str()) {
            return Err(duplicate(
                StructuralErrorKind::DuplicateClass,
                format!("class '{}' is declared twice", decl.name),
            ));
        }

        let mut fields: Vec<SsaField> = Vec::with_capacity(decl.fields.len());
        for f in &decl.fields {
            if fields.iter().any(|existing| existing.name == f.name) {
                return Err(duplicate(
                    StructuralErrorKind::DuplicateField,
                    format!("field '{}' is declared twice in class '{}'", f.name, decl.name),
                ));
            }
            fields.push(SsaField {
                name: f.name.clone(),
                decl: f.ty.clone(),
                ty: None,
            });
        }

        let mut methods = Vec::with_capacity(decl.methods.len());
        for m in &decl.methods {
            if decl.methods.iter().filter(|other| other.name == m.name).count() > 1 {
                return Err(duplicate(
                    StructuralErrorKind::DuplicateMethod,
                    format!("method '{}' is declared twice in class '{}'", m.name, decl.name),
                ));
            }
            methods.push(g.lower_method(&decl.name, m)?);
        }

        classes.push(SsaClass {
            name: decl.name.clone(),
            extends: decl.extends.clone(),
            fields,
            methods,
        });
    }

    Ok(SsaProgram::new(main, classes, g.next_id()))
}

fn duplicate(kind: StructuralErrorKind, message: String) -> CompileError {
    CompileError::Structural { kind, message }
}
