//! Variables: statements joined through `Unify`/`Alias` into one storage unit.

use std::collections::HashMap;

use super::AllocError;
use crate::ssa::{Op, Pin, Statement, StmtId};

/// Disjoint sets over body positions with path compression.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Join two sets. The lower root survives so the earliest statement is
    /// always the representative.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        let (keep, drop) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[drop] = keep;
        keep
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    /// Body positions of the member statements, ascending.
    pub members: Vec<usize>,
    pub pin: Option<Pin>,
}

impl Variable {
    pub fn master(&self) -> usize {
        self.members[0]
    }

    pub fn pinned_register(&self) -> Option<usize> {
        match self.pin {
            Some(Pin::Register(r)) => Some(r),
            _ => None,
        }
    }
}

/// Dense index of the variables of one method body.
#[derive(Debug, Clone)]
pub struct Variables {
    vars: Vec<Variable>,
    by_position: Vec<Option<usize>>,
    by_id: HashMap<StmtId, usize>,
}

/// Statements that take part in allocation: value producers and the merges
/// that tie them together.
fn tracked(stmt: &Statement) -> bool {
    stmt.op.defines_value() || stmt.op.is_merge()
}

impl Variables {
    pub fn build(body: &[Statement]) -> Result<Self, AllocError> {
        let position: HashMap<StmtId, usize> =
            body.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

        let mut sets = UnionFind::new(body.len());
        for (i, stmt) in body.iter().enumerate() {
            let joined = match stmt.op {
                Op::Unify => vec![stmt.left, stmt.right],
                Op::Alias => vec![stmt.left],
                _ => continue,
            };
            for id in joined.into_iter().flatten() {
                if let Some(&j) = position.get(&id) {
                    sets.union(i, j);
                }
            }
        }

        let mut vars: Vec<Variable> = Vec::new();
        let mut root_to_var: HashMap<usize, usize> = HashMap::new();
        let mut by_position = vec![None; body.len()];
        let mut by_id = HashMap::new();

        for (i, stmt) in body.iter().enumerate() {
            if !tracked(stmt) {
                continue;
            }
            let root = sets.find(i);
            let v = *root_to_var.entry(root).or_insert_with(|| {
                vars.push(Variable {
                    members: Vec::new(),
                    pin: None,
                });
                vars.len() - 1
            });

            let var = &mut vars[v];
            var.members.push(i);
            if let Some(pin) = stmt.pin {
                match var.pin {
                    None => var.pin = Some(pin),
                    Some(existing) if existing != pin => {
                        return Err(AllocError::ConflictingPins {
                            stmt: stmt.id,
                            first: existing,
                            second: pin,
                        });
                    }
                    Some(_) => {}
                }
            }
            by_position[i] = Some(v);
            by_id.insert(stmt.id, v);
        }

        Ok(Self {
            vars,
            by_position,
            by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, v: usize) -> &Variable {
        &self.vars[v]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Variable)> {
        self.vars.iter().enumerate()
    }

    pub fn at(&self, position: usize) -> Option<usize> {
        self.by_position.get(position).copied().flatten()
    }

    pub fn of(&self, id: StmtId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }
}
