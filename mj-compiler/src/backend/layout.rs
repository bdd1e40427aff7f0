//! Object and dispatch-table layout.
//!
//! An object is one header word holding its vtable address followed by the
//! fields of every class on its chain, root class first. A vtable lists each
//! method name once, in the order it is first declared walking root to leaf;
//! an override reuses the slot of the method it replaces.

use super::abi::WORD_SIZE;
use crate::ssa::{SsaClass, SsaProgram};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableEntry {
    pub method: String,
    /// Class whose body implements this slot.
    pub class: String,
}

/// Classes from `name` up to the root, leaf first. Stops at unknown parents
/// and at the first repeated class.
pub fn chain<'p>(program: &'p SsaProgram, name: &str) -> Vec<&'p SsaClass> {
    let mut out: Vec<&SsaClass> = Vec::new();
    let mut next = program.class(name);
    while let Some(class) = next {
        if out.iter().any(|c| c.name == class.name) {
            break;
        }
        out.push(class);
        next = class.extends.as_deref().and_then(|p| program.class(p));
    }
    out
}

/// Object size in words, header included.
pub fn object_size(program: &SsaProgram, class: &str) -> Option<usize> {
    program.class(class)?;
    let fields: usize = chain(program, class).iter().map(|c| c.fields.len()).sum();
    Some(1 + fields)
}

/// Byte offset of `field` inside an object of `class`. A field declared
/// again in a subclass hides the inherited one.
pub fn field_offset(program: &SsaProgram, class: &str, field: &str) -> Option<i32> {
    let classes = chain(program, class);
    for (depth, owner) in classes.iter().enumerate() {
        if let Some(index) = owner.fields.iter().position(|f| f.name == field) {
            let inherited: usize = classes[depth + 1..].iter().map(|c| c.fields.len()).sum();
            return Some(WORD_SIZE * (1 + inherited + index) as i32);
        }
    }
    None
}

pub fn vtable(program: &SsaProgram, class: &str) -> Vec<VtableEntry> {
    let mut entries: Vec<VtableEntry> = Vec::new();
    for owner in chain(program, class).into_iter().rev() {
        for method in &owner.methods {
            match entries.iter_mut().find(|e| e.method == method.name) {
                Some(entry) => entry.class = owner.name.clone(),
                None => entries.push(VtableEntry {
                    method: method.name.clone(),
                    class: owner.name.clone(),
                }),
            }
        }
    }
    entries
}

pub fn method_slot(program: &SsaProgram, class: &str, method: &str) -> Option<usize> {
    vtable(program, class).iter().position(|e| e.method == method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_to_ssa;

    const FAMILY: &str = "
        class Main { public static void main(String[] a) { System.out.println(1); } }
        class Parent {
            int a; int b;
            public int f() { return 1; }
            public int g() { return 2; }
        }
        class Child extends Parent {
            int c;
            public int g() { return 3; }
            public int h() { return 4; }
        }
        class Grandchild extends Child {
            int b;
            public int f() { return 5; }
        }
    ";

    #[test]
    fn sizes_count_inherited_fields() {
        let program = compile_to_ssa(FAMILY).unwrap();
        assert_eq!(object_size(&program, "Parent"), Some(3));
        assert_eq!(object_size(&program, "Child"), Some(4));
        assert_eq!(object_size(&program, "Grandchild"), Some(5));
        assert_eq!(object_size(&program, "Missing"), None);
    }

    #[test]
    fn field_offsets_follow_the_chain() {
        let program = compile_to_ssa(FAMILY).unwrap();
        assert_eq!(field_offset(&program, "Child", "a"), Some(4));
        assert_eq!(field_offset(&program, "Child", "c"), Some(12));
        assert_eq!(field_offset(&program, "Grandchild", "b"), Some(16));
        assert_eq!(field_offset(&program, "Child", "b"), Some(8));
        assert_eq!(field_offset(&program, "Parent", "c"), None);
    }

    #[test]
    fn overrides_keep_their_slot() {
        let program = compile_to_ssa(FAMILY).unwrap();
        let table = vtable(&program, "Grandchild");
        let names: Vec<(&str, &str)> = table
            .iter()
            .map(|e| (e.method.as_str(), e.class.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("f", "Grandchild"), ("g", "Child"), ("h", "Child")]
        );
        assert_eq!(method_slot(&program, "Parent", "g"), Some(1));
        assert_eq!(method_slot(&program, "Child", "g"), Some(1));
        assert_eq!(method_slot(&program, "Child", "h"), Some(2));
    }
}
