//! Static types and the resolved class table.

pub mod checker;

use std::collections::HashMap;
use std::fmt;

pub use checker::type_check;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticType {
    Int,
    Boolean,
    Void,
    /// Nominal reference type. Only the root has no parent.
    Object {
        name: String,
        parent: Option<TypeId>,
    },
}

/// Coarse runtime representation used by the equality policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Boolean,
    Reference,
    Void,
}

/// Arena of every type known to a program, addressed by [`TypeId`].
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<StaticType>,
    by_name: HashMap<String, TypeId>,
}

pub const OBJECT: TypeId = TypeId(0);
pub const INT: TypeId = TypeId(1);
pub const BOOLEAN: TypeId = TypeId(2);
pub const INT_ARRAY: TypeId = TypeId(3);
pub const VOID: TypeId = TypeId(4);

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// A table holding only the built-in types.
    pub fn new() -> Self {
        let mut table = TypeTable {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        table.insert(
            "Object",
            StaticType::Object {
                name: "Object".into(),
                parent: None,
            },
        );
        table.insert("int", StaticType::Int);
        table.insert("boolean", StaticType::Boolean);
        table.insert(
            "int[]",
            StaticType::Object {
                name: "int[]".into(),
                parent: Some(OBJECT),
            },
        );
        table.insert("void", StaticType::Void);
        table
    }

    fn insert(&mut self, name: &str, ty: StaticType) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(ty);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register a class whose parent is already resolved.
    pub fn add_class(&mut self, name: &str, parent: TypeId) -> TypeId {
        self.insert(
            name,
            StaticType::Object {
                name: name.to_string(),
                parent: Some(parent),
            },
        )
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> &StaticType {
        &self.types[id.0]
    }

    pub fn name(&self, id: TypeId) -> &str {
        match self.get(id) {
            StaticType::Int => "int",
            StaticType::Boolean => "boolean",
            StaticType::Void => "void",
            StaticType::Object { name, .. } => name,
        }
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            StaticType::Object { parent, .. } => *parent,
            _ => None,
        }
    }

    pub fn is_object(&self, id: TypeId) -> bool {
        matches!(self.get(id), StaticType::Object { .. })
    }

    pub fn kind(&self, id: TypeId) -> ValueKind {
        match self.get(id) {
            StaticType::Int => ValueKind::Int,
            StaticType::Boolean => ValueKind::Boolean,
            StaticType::Void => ValueKind::Void,
            StaticType::Object { .. } => ValueKind::Reference,
        }
    }

    /// `sub` may be used where `sup` is expected.
    ///
    /// Primitives are only compatible with themselves; object types follow
    /// parent links up to the root.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut cur = self.parent(sub);
        while let Some(t) = cur {
            if t == sup {
                return true;
            }
            cur = self.parent(t);
        }
        false
    }

    /// The chain `id, parent(id), ...` up to and including the root.
    pub fn ancestors(&self, id: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::successors(Some(id), move |t| self.parent(*t))
    }
}

/// Display adapter for a type id.
pub struct TypeDisplay<'a>(pub &'a TypeTable, pub TypeId);

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name(self.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_only_match_themselves() {
        let table = TypeTable::new();
        assert!(table.is_subtype(INT, INT));
        assert!(!table.is_subtype(INT, BOOLEAN));
        assert!(!table.is_subtype(INT, OBJECT));
    }

    #[test]
    fn classes_follow_parent_chain_to_root() {
        let mut table = TypeTable::new();
        let a = table.add_class("A", OBJECT);
        let b = table.add_class("B", a);
        assert!(table.is_subtype(b, a));
        assert!(table.is_subtype(b, OBJECT));
        assert!(!table.is_subtype(a, b));
        assert!(table.is_subtype(INT_ARRAY, OBJECT));
        assert!(!table.is_subtype(INT_ARRAY, a));
        assert_eq!(table.ancestors(b).collect::<Vec<_>>(), vec![b, a, OBJECT]);
    }
}
