//! Spill code insertion.
//!
//! A rewrite builds a fresh body: every statement that reads a spilled
//! variable is preceded by one `Load` per such variable, and every
//! definition of a spilled variable that is read later is followed by a
//! `Store` to the variable's slot.

use std::collections::{BTreeMap, HashMap};

use super::variables::Variables;
use crate::backend::liveness::Liveness;
use crate::ssa::{Op, Special, Statement, StmtId};
use crate::types::TypeId;

/// Which variables may be chosen as spills.
///
/// Variables that are already spill code (reloads, or definitions whose
/// only readers are stores) and variables nobody reads would come back
/// unchanged from a rewrite, so they are excluded.
pub fn candidates(body: &[Statement], vars: &Variables, live: &Liveness) -> Vec<bool> {
    let mut readers: Vec<Vec<Op>> = vec![Vec::new(); vars.len()];
    for (i, used) in live.uses.iter().enumerate() {
        for &v in used {
            readers[v].push(body[i].op);
        }
    }

    vars.iter()
        .map(|(v, var)| {
            let only_reloads = var
                .members
                .iter()
                .filter(|&&m| body[m].op.defines_value())
                .all(|&m| body[m].op == Op::Load);
            let only_stored = readers[v].iter().all(|&op| op == Op::Store);
            !(readers[v].is_empty() || only_reloads || only_stored)
        })
        .collect()
}

/// First slot not taken by spill code already in `body`.
pub fn next_free_slot(body: &[Statement]) -> usize {
    body.iter()
        .filter(|s| matches!(s.op, Op::Store | Op::Load))
        .filter_map(|s| match s.special {
            Special::Slot(n) => Some(n + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

pub fn rewrite(
    body: Vec<Statement>,
    vars: &Variables,
    live: &Liveness,
    slots: &BTreeMap<usize, usize>,
    next_id: &mut u32,
) -> Vec<Statement> {
    let mut fresh = || {
        let id = StmtId(*next_id);
        *next_id += 1;
        id
    };

    // Type of each spilled variable, taken from its first typed member.
    let mut var_types: HashMap<usize, TypeId> = HashMap::new();
    for (&v, _) in slots {
        if let Some(ty) = vars.get(v).members.iter().find_map(|&m| body[m].ty) {
            var_types.insert(v, ty);
        }
    }

    let mut out = Vec::with_capacity(body.len() + 2 * slots.len());
    for (i, mut stmt) in body.into_iter().enumerate() {
        if !stmt.op.is_merge() {
            let mut reloads: BTreeMap<usize, StmtId> = BTreeMap::new();
            for operand in stmt.uses() {
                let Some(v) = vars.of(operand) else {
                    continue;
                };
                let Some(&slot) = slots.get(&v) else {
                    continue;
                };
                let load = *reloads.entry(v).or_insert_with(|| {
                    let mut load =
                        Statement::new(fresh(), Op::Load).with_special(Special::Slot(slot));
                    load.ty = var_types.get(&v).copied();
                    let id = load.id;
                    out.push(load);
                    id
                });
                stmt.replace_use(operand, load);
            }
        }

        let store = match live.defs[i] {
            Some(v) if live.is_live_after(i, v) => slots.get(&v).map(|&slot| {
                let mut store = Statement::new(fresh(), Op::Store)
                    .with_left(stmt.id)
                    .with_special(Special::Slot(slot));
                store.ty = stmt.ty;
                store
            }),
            _ => None,
        };
        out.push(stmt);
        out.extend(store);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(id: u32, op: Op) -> Statement {
        Statement::new(StmtId(id), op)
    }

    #[test]
    fn rewrite_inserts_store_and_load() {
        let body = vec![
            stmt(0, Op::Int).with_special(Special::Int(1)),
            stmt(1, Op::Int).with_special(Special::Int(2)),
            stmt(2, Op::Print).with_left(StmtId(1)),
            stmt(3, Op::Plus).with_left(StmtId(0)).with_right(StmtId(0)),
            stmt(4, Op::Print).with_left(StmtId(3)),
        ];
        let vars = Variables::build(&body).unwrap();
        let live = Liveness::compute(&body, &vars);
        let v0 = vars.of(StmtId(0)).unwrap();
        let slots = BTreeMap::from([(v0, 0)]);
        let mut next = 10;

        let out = rewrite(body, &vars, &live, &slots, &mut next);
        let ops: Vec<Op> = out.iter().map(|s| s.op).collect();
        assert_eq!(
            ops,
            vec![Op::Int, Op::Store, Op::Int, Op::Print, Op::Load, Op::Plus, Op::Print]
        );
        // One reload serves both operands.
        assert_eq!(out[5].left, Some(out[4].id));
        assert_eq!(out[5].right, Some(out[4].id));
        assert_eq!(out[1].left, Some(StmtId(0)));
        assert_eq!(next, 12);
        assert_eq!(next_free_slot(&out), 1);
    }

    #[test]
    fn spill_code_is_not_a_candidate() {
        let body = vec![
            stmt(0, Op::Int),
            stmt(1, Op::Store).with_left(StmtId(0)).with_special(Special::Slot(0)),
            stmt(2, Op::Load).with_special(Special::Slot(0)),
            stmt(3, Op::Int),
            stmt(4, Op::Plus).with_left(StmtId(2)).with_right(StmtId(3)),
            stmt(5, Op::Print).with_left(StmtId(4)),
        ];
        let vars = Variables::build(&body).unwrap();
        let live = Liveness::compute(&body, &vars);
        let cands = candidates(&body, &vars, &live);
        let of = |id| cands[vars.of(StmtId(id)).unwrap()];
        assert!(!of(0));
        assert!(!of(2));
        assert!(of(3));
        assert!(of(4));
    }
}
