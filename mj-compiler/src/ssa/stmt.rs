use serde::Serialize;
use std::fmt;

use crate::ast::TypeName;
use crate::types::TypeId;

/// Creation-ordered identity of a statement, unique within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StmtId(pub u32);

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    // meta
    Unify,
    Alias,

    // data
    This,
    Parameter,
    Arg,
    Null,
    Int,
    Boolean,
    NewObj,
    NewIntArray,

    // control flow
    Label,
    Goto,
    Branch,
    NBranch,
    Call,
    Print,
    Return,

    // memory
    Member,
    Index,
    Store,
    Load,
    VarAssg,
    MemberAssg,
    IndexAssg,

    // unary and binary
    Not,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
}

impl Op {
    /// Whether executing this op produces a value that occupies a register.
    ///
    /// `Unify` and `Alias` only rename existing values.
    pub fn defines_value(self) -> bool {
        !matches!(
            self,
            Op::Unify
                | Op::Alias
                | Op::Label
                | Op::Goto
                | Op::Branch
                | Op::NBranch
                | Op::Print
                | Op::Return
                | Op::Store
                | Op::MemberAssg
                | Op::IndexAssg
        )
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Op::Goto | Op::Branch | Op::NBranch)
    }

    pub fn is_merge(self) -> bool {
        matches!(self, Op::Unify | Op::Alias)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A call descriptor: the method name and the `Arg` statements in position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub method: String,
    pub args: Vec<StmtId>,
}

/// Out-of-band payload whose meaning depends on the op.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Special {
    #[default]
    None,
    /// `Parameter` and `Arg` position.
    Position(usize),
    Int(i32),
    Bool(bool),
    /// `Label`, `Goto`, `Branch`, `NBranch`.
    Label(String),
    /// Class of `NewObj`, field of `Member`/`MemberAssg`, variable of `VarAssg`.
    Name(String),
    /// Declared type of a `Null`.
    Type(TypeName),
    Call(CallSpec),
    /// Index operand of an `IndexAssg`.
    Index(StmtId),
    /// Stack slot of a `Store`/`Load`.
    Slot(usize),
}

impl fmt::Display for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Special::None => Ok(()),
            Special::Position(p) => write!(f, "{}", p),
            Special::Int(n) => write!(f, "{}", n),
            Special::Bool(b) => write!(f, "{}", b),
            Special::Label(s) | Special::Name(s) => f.write_str(s),
            Special::Type(t) => write!(f, "{}", t),
            Special::Call(call) => {
                write!(f, "{}(", call.method)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Special::Index(id) => write!(f, "{}", id),
            Special::Slot(n) => write!(f, "{}", n),
        }
    }
}

/// A register fixed by the calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    Register(usize),
    /// The value lives only in memory, e.g. a stack-passed argument.
    NoRegister,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: StmtId,
    pub op: Op,
    pub left: Option<StmtId>,
    pub right: Option<StmtId>,
    pub special: Special,
    pub ty: Option<TypeId>,
    pub register: Option<usize>,
    pub pin: Option<Pin>,
}

impl Statement {
    pub fn new(id: StmtId, op: Op) -> Self {
        Self {
            id,
            op,
            left: None,
            right: None,
            special: Special::None,
            ty: None,
            register: None,
            pin: None,
        }
    }

    pub fn with_left(mut self, left: StmtId) -> Self {
        self.left = Some(left);
        self
    }

    pub fn with_right(mut self, right: StmtId) -> Self {
        self.right = Some(right);
        self
    }

    pub fn with_special(mut self, special: Special) -> Self {
        self.special = special;
        self
    }

    pub fn label(&self) -> Option<&str> {
        match &self.special {
            Special::Label(l) => Some(l),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.special {
            Special::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self.special {
            Special::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn call(&self) -> Option<&CallSpec> {
        match &self.special {
            Special::Call(c) => Some(c),
            _ => None,
        }
    }

    /// Every statement this one refers to, in operand order.
    pub fn operands(&self) -> Vec<StmtId> {
        let mut out = Vec::with_capacity(2);
        out.extend(self.left);
        out.extend(self.right);
        match &self.special {
            Special::Call(call) => out.extend(call.args.iter().copied()),
            Special::Index(idx) => out.push(*idx),
            _ => {}
        }
        out
    }

    /// Operands whose value is read when this statement executes.
    ///
    /// Merges read nothing; they only tie their operands together.
    pub fn uses(&self) -> Vec<StmtId> {
        if self.op.is_merge() {
            Vec::new()
        } else {
            self.operands()
        }
    }

    /// Substitute every read of `from` with `to`.
    pub fn replace_use(&mut self, from: StmtId, to: StmtId) {
        if self.left == Some(from) {
            self.left = Some(to);
        }
        if self.right == Some(from) {
            self.right = Some(to);
        }
        match &mut self.special {
            Special::Call(call) => {
                for arg in call.args.iter_mut().filter(|a| **a == from) {
                    *arg = to;
                }
            }
            Special::Index(idx) if *idx == from => *idx = to,
            _ => {}
        }
    }
}
