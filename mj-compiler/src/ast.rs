//! Typed syntax tree handed to the SSA builder.
//!
//! Every node category is a closed enum; passes walk it with one exhaustive
//! `match` per category.

use std::fmt;

/// Identity of a control-flow statement, used to name its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub main: MainClass,
    pub classes: Vec<ClassDecl>,
}

#[derive(Debug, Clone)]
pub struct MainClass {
    pub name: String,
    pub body: Stmt,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub extends: Option<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub ty: TypeName,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub ret_ty: TypeName,
    pub name: String,
    pub params: Vec<Param>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Stmt>,
    pub ret: Expr,
}

/// A type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeName {
    Int,
    Boolean,
    IntArray,
    Class(String),
}

impl TypeName {
    /// Name used to look the type up in the resolved type table.
    pub fn as_str(&self) -> &str {
        match self {
            TypeName::Int => "int",
            TypeName::Boolean => "boolean",
            TypeName::IntArray => "int[]",
            TypeName::Class(name) => name,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<Stmt>),
    If {
        id: NodeId,
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        id: NodeId,
        condition: Expr,
        body: Box<Stmt>,
    },
    Print(Expr),
    /// Expression evaluated for its effect, e.g. an assignment or a call.
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// `target = value`; evaluates to the assigned value.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// Field access; `length` on an `int[]` reads the array header.
    Member {
        target: Box<Expr>,
        member: String,
    },
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    NewObject(String),
    NewIntArray(Box<Expr>),
    This,
    Var(String),
    IntLit(i32),
    BoolLit(bool),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// Whether evaluating this expression assigns anywhere inside it.
    pub fn has_assignment(&self) -> bool {
        match self {
            Expr::Assign { .. } => true,
            Expr::Binary { left, right, .. } => left.has_assignment() || right.has_assignment(),
            Expr::Not(inner) | Expr::NewIntArray(inner) => inner.has_assignment(),
            Expr::Index { target, index } => target.has_assignment() || index.has_assignment(),
            Expr::Member { target, .. } => target.has_assignment(),
            Expr::Call { target, args, .. } => {
                target.has_assignment() || args.iter().any(Expr::has_assignment)
            }
            Expr::NewObject(_) | Expr::This | Expr::Var(_) | Expr::IntLit(_) | Expr::BoolLit(_) => {
                false
            }
        }
    }
}
