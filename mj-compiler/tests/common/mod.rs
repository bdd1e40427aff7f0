#![allow(dead_code)]

//! Reference interpreter for SSA programs, shared by the integration tests.
//!
//! Statements joined by `Unify`/`Alias` share one storage cell, which is how
//! the register allocator treats them too. Spill slots are per-activation.

use std::collections::HashMap;

mod machine;
pub use machine::{execute, Machine};

use mj_compiler::ast::TypeName;
use mj_compiler::backend::liveness::Liveness;
use mj_compiler::backend::regalloc::coloring::InterferenceGraph;
use mj_compiler::backend::regalloc::variables::Variables;
use mj_compiler::backend::{allocate_program, MethodStats};
use mj_compiler::ssa::{Op, Pin, Special, SsaMethod, SsaProgram, StmtId};
use mj_compiler::{compile_to_checked_ssa, CompileError, StructuralErrorKind, TypeErrorKind};

const FUEL: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Ref(usize),
    Null,
}

impl Value {
    fn int(self) -> Result<i32, String> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(format!("expected int, got {:?}", other)),
        }
    }

    fn bool(self) -> Result<bool, String> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(format!("expected boolean, got {:?}", other)),
        }
    }

    fn reference(self) -> Result<usize, String> {
        match self {
            Value::Ref(r) => Ok(r),
            other => Err(format!("expected reference, got {:?}", other)),
        }
    }
}

/// Equality: ints and booleans by value, references by identity, anything
/// across kinds is unequal.
pub fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => x == y,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

#[derive(Debug, Clone)]
enum Cell {
    Object {
        class: String,
        fields: HashMap<String, Value>,
    },
    Array(Vec<i32>),
}

fn default_for(ty: &TypeName) -> Value {
    match ty {
        TypeName::Int => Value::Int(0),
        TypeName::Boolean => Value::Bool(false),
        _ => Value::Null,
    }
}

pub struct Interpreter<'p> {
    program: &'p SsaProgram,
    heap: Vec<Cell>,
    pub output: Vec<i32>,
    fuel: usize,
}

struct Activation<'m> {
    method: &'m SsaMethod,
    root: HashMap<StmtId, StmtId>,
    cells: HashMap<StmtId, Value>,
    slots: HashMap<usize, Value>,
    this: Option<Value>,
}

impl<'m> Activation<'m> {
    fn new(method: &'m SsaMethod, this: Option<Value>) -> Self {
        let mut parent: HashMap<StmtId, StmtId> = HashMap::new();
        fn find(parent: &HashMap<StmtId, StmtId>, mut x: StmtId) -> StmtId {
            while let Some(&p) = parent.get(&x) {
                if p == x {
                    break;
                }
                x = p;
            }
            x
        }
        for stmt in &method.body {
            let joined = match stmt.op {
                Op::Unify => vec![stmt.left, stmt.right],
                Op::Alias => vec![stmt.left],
                _ => continue,
            };
            for other in joined.into_iter().flatten() {
                let a = find(&parent, stmt.id);
                let b = find(&parent, other);
                if a != b {
                    parent.insert(b, a);
                }
            }
        }
        let root = method
            .body
            .iter()
            .map(|s| (s.id, find(&parent, s.id)))
            .collect();
        Self {
            method,
            root,
            cells: HashMap::new(),
            slots: HashMap::new(),
            this,
        }
    }

    fn set(&mut self, id: StmtId, v: Value) {
        let r = self.root.get(&id).copied().unwrap_or(id);
        self.cells.insert(r, v);
    }

    fn get(&self, id: Option<StmtId>) -> Result<Value, String> {
        let id = id.ok_or("missing operand")?;
        let r = self.root.get(&id).copied().unwrap_or(id);
        self.cells
            .get(&r)
            .copied()
            .ok_or_else(|| format!("read of {} before it was written", id))
    }
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p SsaProgram) -> Self {
        Self {
            program,
            heap: Vec::new(),
            output: Vec::new(),
            fuel: FUEL,
        }
    }

    pub fn run_main(&mut self) -> Result<(), String> {
        let program = self.program;
        self.invoke(&program.main, None, &[]).map(|_| ())
    }

    /// Allocate a fresh instance of `class` and call `method` on it.
    pub fn call_on_new(&mut self, class: &str, method: &str, args: &[Value]) -> Result<Value, String> {
        let obj = self.allocate(class)?;
        let m = self.lookup(class, method)?;
        self.invoke(m, Some(obj), args)
    }

    fn allocate(&mut self, class: &str) -> Result<Value, String> {
        let mut fields = HashMap::new();
        let mut next = Some(class.to_string());
        while let Some(name) = next {
            let decl = self
                .program
                .class(&name)
                .ok_or_else(|| format!("unknown class {}", name))?;
            for f in &decl.fields {
                fields.entry(f.name.clone()).or_insert(default_for(&f.decl));
            }
            next = decl.extends.clone();
        }
        self.heap.push(Cell::Object {
            class: class.to_string(),
            fields,
        });
        Ok(Value::Ref(self.heap.len() - 1))
    }

    fn lookup(&self, class: &str, method: &str) -> Result<&'p SsaMethod, String> {
        let program = self.program;
        let mut next = program.class(class);
        while let Some(c) = next {
            if let Some(m) = c.method(method) {
                return Ok(m);
            }
            next = c.extends.as_deref().and_then(|p| program.class(p));
        }
        Err(format!("{} has no method {}", class, method))
    }

    fn invoke(&mut self, method: &'p SsaMethod, this: Option<Value>, args: &[Value]) -> Result<Value, String> {
        let mut act = Activation::new(method, this);
        let labels = method.labels();
        let body = &method.body;
        let mut pc = 0;

        while pc < body.len() {
            self.fuel = self.fuel.checked_sub(1).ok_or("out of fuel")?;
            let stmt = &body[pc];
            pc += 1;

            let value = match stmt.op {
                Op::Unify | Op::Alias | Op::Label => None,
                Op::This => Some(act.this.ok_or("this outside a method")?),
                Op::Parameter => {
                    let p = stmt.position().ok_or("parameter without position")?;
                    Some(*args.get(p).ok_or("missing argument")?)
                }
                Op::Arg | Op::VarAssg => Some(act.get(stmt.left)?),
                Op::Null => Some(match &stmt.special {
                    Special::Type(t) => default_for(t),
                    _ => Value::Null,
                }),
                Op::Int => match stmt.special {
                    Special::Int(n) => Some(Value::Int(n)),
                    _ => return Err("int without value".into()),
                },
                Op::Boolean => match stmt.special {
                    Special::Bool(b) => Some(Value::Bool(b)),
                    _ => return Err("boolean without value".into()),
                },
                Op::NewObj => Some(self.allocate(stmt.name().ok_or("new without class")?)?),
                Op::NewIntArray => {
                    let n = act.get(stmt.left)?.int()?;
                    if n < 0 {
                        return Err("negative array size".into());
                    }
                    self.heap.push(Cell::Array(vec![0; n as usize]));
                    Some(Value::Ref(self.heap.len() - 1))
                }
                Op::Goto | Op::Branch | Op::NBranch => {
                    let taken = match stmt.op {
                        Op::Goto => true,
                        Op::Branch => act.get(stmt.left)?.bool()?,
                        _ => !act.get(stmt.left)?.bool()?,
                    };
                    if taken {
                        let label = stmt.label().ok_or("jump without label")?;
                        pc = *labels.get(label).ok_or("unknown label")?;
                    }
                    None
                }
                Op::Call => {
                    let target = act.get(stmt.left)?.reference()?;
                    let call = stmt.call().ok_or("call without descriptor")?;
                    let args = call
                        .args
                        .iter()
                        .map(|a| act.get(Some(*a)))
                        .collect::<Result<Vec<_>, _>>()?;
                    let class = match &self.heap[target] {
                        Cell::Object { class, .. } => class.clone(),
                        Cell::Array(_) => return Err("call on an array".into()),
                    };
                    let callee = self.lookup(&class, &call.method)?;
                    Some(self.invoke(callee, Some(Value::Ref(target)), &args)?)
                }
                Op::Print => {
                    let v = act.get(stmt.left)?.int()?;
                    self.output.push(v);
                    None
                }
                Op::Return => return act.get(stmt.left),
                Op::Member => {
                    let target = act.get(stmt.left)?.reference()?;
                    let name = stmt.name().ok_or("member without name")?;
                    Some(match &self.heap[target] {
                        Cell::Array(items) if name == "length" => Value::Int(items.len() as i32),
                        Cell::Object { fields, .. } => {
                            *fields.get(name).ok_or_else(|| format!("no field {}", name))?
                        }
                        Cell::Array(_) => return Err(format!("array has no {}", name)),
                    })
                }
                Op::Index => {
                    let target = act.get(stmt.left)?.reference()?;
                    let i = act.get(stmt.right)?.int()?;
                    match &self.heap[target] {
                        Cell::Array(items) => Some(Value::Int(
                            *items.get(i as usize).ok_or("index out of bounds")?,
                        )),
                        Cell::Object { .. } => return Err("index into an object".into()),
                    }
                }
                Op::Store => {
                    let Special::Slot(slot) = stmt.special else {
                        return Err("store without slot".into());
                    };
                    let v = act.get(stmt.left)?;
                    act.slots.insert(slot, v);
                    None
                }
                Op::Load => {
                    let Special::Slot(slot) = stmt.special else {
                        return Err("load without slot".into());
                    };
                    Some(*act.slots.get(&slot).ok_or("load of an empty slot")?)
                }
                Op::MemberAssg => {
                    let target = act.get(stmt.left)?.reference()?;
                    let v = act.get(stmt.right)?;
                    let name = stmt.name().ok_or("member without name")?.to_string();
                    match &mut self.heap[target] {
                        Cell::Object { fields, .. } => {
                            fields.insert(name, v);
                        }
                        Cell::Array(_) => return Err("field store into an array".into()),
                    }
                    None
                }
                Op::IndexAssg => {
                    let target = act.get(stmt.left)?.reference()?;
                    let v = act.get(stmt.right)?.int()?;
                    let Special::Index(idx) = stmt.special else {
                        return Err("index store without index".into());
                    };
                    let i = act.get(Some(idx))?.int()?;
                    match &mut self.heap[target] {
                        Cell::Array(items) => {
                            *items.get_mut(i as usize).ok_or("index out of bounds")? = v;
                        }
                        Cell::Object { .. } => return Err("index store into an object".into()),
                    }
                    None
                }
                Op::Not => Some(Value::Bool(!act.get(stmt.left)?.bool()?)),
                Op::And | Op::Or => {
                    let l = act.get(stmt.left)?.bool()?;
                    let r = act.get(stmt.right)?.bool()?;
                    Some(Value::Bool(if stmt.op == Op::And { l && r } else { l || r }))
                }
                Op::Eq | Op::Ne => {
                    let eq = values_equal(act.get(stmt.left)?, act.get(stmt.right)?);
                    Some(Value::Bool(if stmt.op == Op::Eq { eq } else { !eq }))
                }
                Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    let l = act.get(stmt.left)?.int()?;
                    let r = act.get(stmt.right)?.int()?;
                    Some(Value::Bool(match stmt.op {
                        Op::Lt => l < r,
                        Op::Le => l <= r,
                        Op::Gt => l > r,
                        _ => l >= r,
                    }))
                }
                Op::Plus | Op::Minus | Op::Mul | Op::Div | Op::Mod => {
                    let l = act.get(stmt.left)?.int()?;
                    let r = act.get(stmt.right)?.int()?;
                    Some(Value::Int(match stmt.op {
                        Op::Plus => l.wrapping_add(r),
                        Op::Minus => l.wrapping_sub(r),
                        Op::Mul => l.wrapping_mul(r),
                        Op::Div => l.checked_div(r).ok_or("division by zero")?,
                        _ => l.checked_rem(r).ok_or("division by zero")?,
                    }))
                }
            };
            if let Some(v) = value {
                act.set(stmt.id, v);
            }
        }
        Ok(Value::Null)
    }
}

/// Run `main` and collect everything it printed.
pub fn run(program: &SsaProgram) -> Result<Vec<i32>, String> {
    let mut interp = Interpreter::new(program);
    interp.run_main()?;
    Ok(interp.output)
}

/// Wrap a statement in a main class.
pub fn main_only(stmt: &str) -> String {
    format!(
        "class Main {{ public static void main(String[] a) {{ {} }} }}",
        stmt
    )
}

/// A program whose main prints `new T().run()` followed by `classes`.
pub fn with_runner(classes: &str) -> String {
    format!(
        "class Main {{ public static void main(String[] a) {{ System.out.println(new T().run()); }} }}\n{}",
        classes
    )
}

/// Type check and allocate with `k` registers.
pub fn allocated(source: &str, k: usize) -> Result<(SsaProgram, Vec<MethodStats>), CompileError> {
    let mut program = compile_to_checked_ssa(source)?;
    let stats = allocate_program(&mut program, k)?;
    Ok((program, stats))
}

/// Allocate with `k` registers, emit assembly and run it on the machine.
pub fn run_mips(source: &str, k: usize) -> Result<Vec<i32>, String> {
    let (program, _) = allocated(source, k).map_err(|e| e.to_string())?;
    let asm = mj_compiler::backend::codegen::emit_program(&program).map_err(|e| e.to_string())?;
    execute(&asm)
}

/// Check an allocated body: members of a variable share a register, values
/// that are live at the same time never do, and everything not pinned to the
/// stack has a register below `limit`.
pub fn assert_register_safe(method: &SsaMethod, limit: usize) {
    let vars = Variables::build(&method.body).expect("allocated body has consistent pins");
    let live = Liveness::compute(&method.body, &vars);
    let graph = InterferenceGraph::build(&vars, &live);
    let reg = |v: usize| method.body[vars.get(v).master()].register;

    for (v, var) in vars.iter() {
        for &m in &var.members {
            assert_eq!(
                method.body[m].register,
                reg(v),
                "{} and {} are one variable but sit in different registers",
                method.body[m].id,
                method.body[var.master()].id
            );
        }
        if var.pin == Some(Pin::NoRegister) {
            assert_eq!(reg(v), None);
        } else {
            let r = reg(v).unwrap_or_else(|| {
                panic!("{} has no register", method.body[var.master()].id)
            });
            assert!(r < limit, "register {} is out of range", r);
        }
    }

    for a in 0..graph.len() {
        for b in graph.neighbors(a) {
            if let (Some(x), Some(y)) = (reg(a), reg(b)) {
                assert_ne!(
                    x,
                    y,
                    "{} and {} are live together in register {}",
                    method.body[vars.get(a).master()].id,
                    method.body[vars.get(b).master()].id,
                    x
                );
            }
        }
    }
}

pub fn assert_structural_error<T: std::fmt::Debug>(
    result: Result<T, CompileError>,
    expected: StructuralErrorKind,
) {
    match result {
        Ok(v) => panic!("Expected {:?} error, but compilation succeeded: {:?}", expected, v),
        Err(CompileError::Structural { kind, .. }) => assert_eq!(kind, expected),
        Err(other) => panic!("Expected {:?} structural error, got: {:?}", expected, other),
    }
}

pub fn assert_type_error<T: std::fmt::Debug>(result: Result<T, CompileError>, expected: TypeErrorKind) {
    match result {
        Ok(v) => panic!("Expected {:?} error, but compilation succeeded: {:?}", expected, v),
        Err(CompileError::Type { kind, .. }) => assert_eq!(kind, expected),
        Err(other) => panic!("Expected {:?} type error, got: {:?}", expected, other),
    }
}
