//! Type checking over the SSA form.
//!
//! The class hierarchy is resolved first, then every method body is walked in
//! order, giving each statement a type derived from its already-typed
//! operands. The first violation aborts the check.

use std::collections::HashMap;

use tracing::debug;

use super::{TypeId, TypeTable, BOOLEAN, INT, INT_ARRAY, OBJECT, VOID};
use crate::ast::TypeName;
use crate::ssa::{Op, Special, SsaMethod, SsaProgram, Statement, StmtId};
use crate::{CompileError, StructuralErrorKind, TypeErrorKind};

#[derive(Debug, Clone)]
struct Signature {
    params: Vec<TypeId>,
    ret: TypeId,
}

#[derive(Debug, Clone, Default)]
struct ClassInfo {
    fields: HashMap<String, TypeId>,
    methods: HashMap<String, Signature>,
}

type RuleResult = Result<TypeId, (TypeErrorKind, String)>;

/// Type check the whole program, recording a type on every statement and the
/// resolved type table on the program.
pub fn type_check(program: &mut SsaProgram) -> Result<(), CompileError> {
    let mut types = TypeTable::new();
    resolve_hierarchy(program, &mut types)?;
    let classes = resolve_members(program, &types)?;

    let checker = Checker {
        types: &types,
        classes: &classes,
    };
    checker.check_method(&mut program.main, None)?;
    for class in program.classes.iter_mut() {
        let this_ty = types.lookup(&class.name);
        for method in class.methods.iter_mut() {
            checker.check_method(method, this_ty)?;
        }
    }

    program.types = types;
    Ok(())
}

/// Add classes to the table parent-first. A pass that adds nothing means the
/// remaining classes form a cycle or extend something unknown.
fn resolve_hierarchy(program: &SsaProgram, types: &mut TypeTable) -> Result<(), CompileError> {
    for class in &program.classes {
        if types.lookup(&class.name).is_some() {
            return Err(CompileError::Structural {
                kind: StructuralErrorKind::DuplicateClass,
                message: format!("class '{}' redefines a built-in type", class.name),
            });
        }
    }

    let mut pending: Vec<_> = program.classes.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|class| {
            let parent = match class.extends.as_deref() {
                None => Some(OBJECT),
                Some(name) => types.lookup(name).filter(|t| types.is_object(*t) && *t != INT_ARRAY),
            };
            match parent {
                Some(parent) => {
                    types.add_class(&class.name, parent);
                    false
                }
                None => true,
            }
        });
        if pending.len() == before {
            let names: Vec<_> = pending.iter().map(|c| c.name.as_str()).collect();
            return Err(CompileError::Structural {
                kind: StructuralErrorKind::CyclicInheritance,
                message: format!(
                    "parent type cannot be resolved or is circular for: {}",
                    names.join(", ")
                ),
            });
        }
    }
    Ok(())
}

fn resolve_type(types: &TypeTable, name: &TypeName) -> Result<TypeId, CompileError> {
    types.lookup(name.as_str()).ok_or_else(|| CompileError::Structural {
        kind: StructuralErrorKind::UnresolvedType,
        message: format!("'{}' cannot be resolved to a type", name),
    })
}

/// Resolve declared field and method types, writing them back onto the program.
fn resolve_members(
    program: &mut SsaProgram,
    types: &TypeTable,
) -> Result<HashMap<String, ClassInfo>, CompileError> {
    let mut classes = HashMap::new();
    for class in program.classes.iter_mut() {
        let mut info = ClassInfo::default();
        for field in class.fields.iter_mut() {
            let ty = resolve_type(types, &field.decl)?;
            field.ty = Some(ty);
            info.fields.insert(field.name.clone(), ty);
        }
        for method in class.methods.iter_mut() {
            let params = method
                .params
                .iter()
                .map(|p| resolve_type(types, &p.ty))
                .collect::<Result<Vec<_>, _>>()?;
            let ret = match &method.ret_decl {
                Some(decl) => resolve_type(types, decl)?,
                None => VOID,
            };
            method.param_types = params.clone();
            method.ret_type = Some(ret);
            info.methods
                .insert(method.name.clone(), Signature { params, ret });
        }
        classes.insert(class.name.clone(), info);
    }
    Ok(classes)
}

struct Checker<'a> {
    types: &'a TypeTable,
    classes: &'a HashMap<String, ClassInfo>,
}

/// The method being checked, minus its body.
struct Frame<'m> {
    this: Option<TypeId>,
    params: &'m [TypeId],
    ret: Option<TypeId>,
}

impl<'a> Checker<'a> {
    fn check_method(&self, method: &mut SsaMethod, this: Option<TypeId>) -> Result<(), CompileError> {
        let params = method.param_types.clone();
        let frame = Frame {
            this,
            params: &params,
            ret: method.ret_type,
        };

        let mut typed: HashMap<StmtId, TypeId> = HashMap::new();
        for stmt in method.body.iter_mut() {
            if let (Op::Null, Special::Type(decl)) = (stmt.op, &stmt.special) {
                // A local's declared type resolves like a field's or parameter's.
                resolve_type(self.types, decl)?;
            }
            let ty = self
                .rule(stmt, &frame, &typed)
                .map_err(|(kind, message)| CompileError::Type {
                    kind,
                    stmt: stmt.id,
                    message,
                })?;
            if stmt.op == Op::VarAssg {
                // `right` only carried the variable's previous value for its type.
                stmt.right = None;
            }
            stmt.ty = Some(ty);
            typed.insert(stmt.id, ty);
        }

        debug!(method = %method.name, statements = method.body.len(), "type checked");
        Ok(())
    }

    fn operand(&self, typed: &HashMap<StmtId, TypeId>, id: Option<StmtId>) -> RuleResult {
        let id = id.ok_or((TypeErrorKind::UntypedOperand, "missing operand".to_string()))?;
        typed.get(&id).copied().ok_or((
            TypeErrorKind::UntypedOperand,
            format!("operand {} is used before it is defined", id),
        ))
    }

    fn name(&self, ty: TypeId) -> &str {
        self.types.name(ty)
    }

    fn expect(&self, actual: TypeId, expected: TypeId, kind: TypeErrorKind, what: &str) -> Result<(), (TypeErrorKind, String)> {
        if actual == expected {
            Ok(())
        } else {
            Err((
                kind,
                format!("{} must be {}, found {}", what, self.name(expected), self.name(actual)),
            ))
        }
    }

    fn class_of(&self, target: TypeId) -> Result<(), (TypeErrorKind, String)> {
        if !self.types.is_object(target) {
            return Err((
                TypeErrorKind::NotAnObject,
                format!("target of type {} is not an object", self.name(target)),
            ));
        }
        Ok(())
    }

    fn find_field(&self, target: TypeId, field: &str) -> Option<TypeId> {
        self.types
            .ancestors(target)
            .filter_map(|t| self.classes.get(self.types.name(t)))
            .find_map(|info| info.fields.get(field).copied())
    }

    fn find_method(&self, target: TypeId, method: &str) -> Option<&Signature> {
        self.types
            .ancestors(target)
            .filter_map(|t| self.classes.get(self.types.name(t)))
            .find_map(|info| info.methods.get(method))
    }

    fn field_type(&self, target: TypeId, field: &str) -> RuleResult {
        self.class_of(target)?;
        self.find_field(target, field).ok_or((
            TypeErrorKind::UnknownField,
            format!("field {} could not be resolved on {}", field, self.name(target)),
        ))
    }

    fn rule(&self, stmt: &Statement, frame: &Frame<'_>, typed: &HashMap<StmtId, TypeId>) -> RuleResult {
        let left = || self.operand(typed, stmt.left);
        let right = || self.operand(typed, stmt.right);

        match stmt.op {
            Op::Unify => {
                let (l, r) = (left()?, right()?);
                if l != r {
                    return Err((
                        TypeErrorKind::UnifyMismatch,
                        format!(
                            "cannot unify statements of different types ({} and {})",
                            self.name(l),
                            self.name(r)
                        ),
                    ));
                }
                Ok(l)
            }
            Op::Alias | Op::Arg | Op::Store => left(),
            Op::This => frame.this.ok_or((
                TypeErrorKind::ThisInMain,
                "cannot reference 'this' within main()".to_string(),
            )),
            Op::Parameter => {
                let position = stmt.position().unwrap_or(usize::MAX);
                frame.params.get(position).copied().ok_or((
                    TypeErrorKind::ParameterOutsideMethod,
                    format!("no parameter at position {}", position),
                ))
            }
            Op::Null => match &stmt.special {
                Special::Type(decl) => self.types.lookup(decl.as_str()).ok_or((
                    TypeErrorKind::UnknownClass,
                    format!("type {} could not be resolved", decl),
                )),
                _ => Err((TypeErrorKind::UnknownClass, "null without a declared type".to_string())),
            },
            Op::Int => Ok(INT),
            Op::Boolean => Ok(BOOLEAN),
            Op::NewObj => {
                let class = stmt.name().unwrap_or_default();
                match self.types.lookup(class) {
                    Some(t) if self.classes.contains_key(class) => Ok(t),
                    _ => Err((
                        TypeErrorKind::UnknownClass,
                        format!("type {} could not be resolved to a defined class", class),
                    )),
                }
            }
            Op::NewIntArray => {
                self.expect(left()?, INT, TypeErrorKind::OperandNotInt, "array size")?;
                Ok(INT_ARRAY)
            }
            Op::Label | Op::Goto => Ok(VOID),
            Op::Branch | Op::NBranch => {
                self.expect(left()?, BOOLEAN, TypeErrorKind::ConditionNotBoolean, "branch condition")?;
                Ok(VOID)
            }
            Op::Call => self.call(stmt, typed),
            Op::Print => {
                self.expect(left()?, INT, TypeErrorKind::OperandNotInt, "printed value")?;
                Ok(VOID)
            }
            Op::Return => {
                let value = left()?;
                let declared = frame.ret.unwrap_or(VOID);
                if !self.types.is_subtype(value, declared) {
                    return Err((
                        TypeErrorKind::ReturnType,
                        format!(
                            "returned {} is not compatible with declared return type {}",
                            self.name(value),
                            self.name(declared)
                        ),
                    ));
                }
                Ok(VOID)
            }
            Op::Member => {
                let target = left()?;
                let member = stmt.name().unwrap_or_default();
                if target == INT_ARRAY && member == "length" {
                    return Ok(INT);
                }
                self.field_type(target, member)
            }
            Op::Index => {
                self.expect(left()?, INT_ARRAY, TypeErrorKind::NotAnArray, "subscripted value")?;
                self.expect(right()?, INT, TypeErrorKind::OperandNotInt, "index")?;
                Ok(INT)
            }
            Op::Load => Err((
                TypeErrorKind::UntypedOperand,
                "reload found before register allocation".to_string(),
            )),
            Op::VarAssg => {
                // The variable's type is the type of its previous value, which
                // leads back to a Parameter or Null.
                let var_ty = right()?;
                let value = left()?;
                if !self.types.is_subtype(value, var_ty) {
                    return Err((
                        TypeErrorKind::AssignmentType,
                        format!(
                            "cannot assign {} to variable {} of type {}",
                            self.name(value),
                            stmt.name().unwrap_or_default(),
                            self.name(var_ty)
                        ),
                    ));
                }
                Ok(var_ty)
            }
            Op::MemberAssg => {
                let field = self.field_type(left()?, stmt.name().unwrap_or_default())?;
                let value = right()?;
                if !self.types.is_subtype(value, field) {
                    return Err((
                        TypeErrorKind::AssignmentType,
                        format!(
                            "cannot assign {} to field of type {}",
                            self.name(value),
                            self.name(field)
                        ),
                    ));
                }
                Ok(field)
            }
            Op::IndexAssg => {
                self.expect(left()?, INT_ARRAY, TypeErrorKind::NotAnArray, "subscripted value")?;
                self.expect(right()?, INT, TypeErrorKind::AssignmentType, "array element")?;
                let index = match stmt.special {
                    Special::Index(i) => self.operand(typed, Some(i))?,
                    _ => return Err((TypeErrorKind::UntypedOperand, "missing index".to_string())),
                };
                self.expect(index, INT, TypeErrorKind::OperandNotInt, "index")?;
                Ok(INT)
            }
            Op::Not => {
                self.expect(left()?, BOOLEAN, TypeErrorKind::OperandNotBoolean, "operand of !")?;
                Ok(BOOLEAN)
            }
            Op::And | Op::Or => {
                self.expect(left()?, BOOLEAN, TypeErrorKind::OperandNotBoolean, "left operand")?;
                self.expect(right()?, BOOLEAN, TypeErrorKind::OperandNotBoolean, "right operand")?;
                Ok(BOOLEAN)
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                self.expect(left()?, INT, TypeErrorKind::OperandNotInt, "left operand")?;
                self.expect(right()?, INT, TypeErrorKind::OperandNotInt, "right operand")?;
                Ok(BOOLEAN)
            }
            Op::Plus | Op::Minus | Op::Mul | Op::Div | Op::Mod => {
                self.expect(left()?, INT, TypeErrorKind::OperandNotInt, "left operand")?;
                self.expect(right()?, INT, TypeErrorKind::OperandNotInt, "right operand")?;
                Ok(INT)
            }
            Op::Eq | Op::Ne => {
                left()?;
                right()?;
                Ok(BOOLEAN)
            }
        }
    }

    fn call(&self, stmt: &Statement, typed: &HashMap<StmtId, TypeId>) -> RuleResult {
        let target = self.operand(typed, stmt.left)?;
        self.class_of(target)?;
        let call = stmt
            .call()
            .ok_or((TypeErrorKind::UnknownMethod, "call without a descriptor".to_string()))?;
        let sig = self.find_method(target, &call.method).ok_or((
            TypeErrorKind::UnknownMethod,
            format!("method {} could not be resolved on {}", call.method, self.name(target)),
        ))?;

        if call.args.len() != sig.params.len() {
            return Err((
                TypeErrorKind::ArgumentCount,
                format!(
                    "method {} takes {} argument(s), {} given",
                    call.method,
                    sig.params.len(),
                    call.args.len()
                ),
            ));
        }
        for (position, (arg, param)) in call.args.iter().zip(&sig.params).enumerate() {
            let arg_ty = self.operand(typed, Some(*arg))?;
            if !self.types.is_subtype(arg_ty, *param) {
                return Err((
                    TypeErrorKind::ArgumentType,
                    format!(
                        "argument {} of method {} has type {}, expected {}",
                        position,
                        call.method,
                        self.name(arg_ty),
                        self.name(*param)
                    ),
                ));
            }
        }
        Ok(sig.ret)
    }
}
