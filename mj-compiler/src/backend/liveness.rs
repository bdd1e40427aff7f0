//! Liveness analysis over one method body.
//!
//! Every statement is its own CFG node. Successors come from fall-through
//! and from the label named by `Goto`/`Branch`/`NBranch`; `Goto` and
//! `Return` never fall through. Sets hold dense variable indices from
//! [`Variables`], so `Unify`/`Alias` members share one entry and the merge
//! statements themselves are transparent.

use std::collections::{BTreeSet, HashMap};

use super::regalloc::variables::Variables;
use crate::ssa::{Op, Statement};

/// Successor positions of each statement.
pub fn successors(body: &[Statement]) -> Vec<Vec<usize>> {
    let labels: HashMap<&str, usize> = body
        .iter()
        .enumerate()
        .filter(|(_, s)| s.op == Op::Label)
        .filter_map(|(i, s)| s.label().map(|l| (l, i)))
        .collect();

    body.iter()
        .enumerate()
        .map(|(i, stmt)| {
            let mut succ = Vec::with_capacity(2);
            if stmt.op.is_jump() {
                if let Some(&target) = stmt.label().and_then(|l| labels.get(l)) {
                    succ.push(target);
                }
            }
            let falls_through = !matches!(stmt.op, Op::Goto | Op::Return);
            if falls_through && i + 1 < body.len() && !succ.contains(&(i + 1)) {
                succ.push(i + 1);
            }
            succ
        })
        .collect()
}

pub struct Liveness {
    pub live_in: Vec<BTreeSet<usize>>,
    pub live_out: Vec<BTreeSet<usize>>,
    /// Variable written by each statement, if any.
    pub defs: Vec<Option<usize>>,
    /// Variables read by each statement.
    pub uses: Vec<BTreeSet<usize>>,
}

impl Liveness {
    pub fn compute(body: &[Statement], vars: &Variables) -> Self {
        let n = body.len();
        let succ = successors(body);

        let defs: Vec<Option<usize>> = body
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if s.op.defines_value() {
                    vars.at(i)
                } else {
                    None
                }
            })
            .collect();
        let uses: Vec<BTreeSet<usize>> = body
            .iter()
            .map(|s| s.uses().into_iter().filter_map(|id| vars.of(id)).collect())
            .collect();

        let mut live_in: Vec<BTreeSet<usize>> = uses.clone();
        let mut live_out: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

        let mut changed = true;
        while changed {
            changed = false;
            for i in (0..n).rev() {
                let mut out = BTreeSet::new();
                for &s in &succ[i] {
                    out.extend(live_in[s].iter().copied());
                }
                if out != live_out[i] {
                    let mut inn = uses[i].clone();
                    inn.extend(out.iter().copied().filter(|v| Some(*v) != defs[i]));
                    live_in[i] = inn;
                    live_out[i] = out;
                    changed = true;
                }
            }
        }

        Self {
            live_in,
            live_out,
            defs,
            uses,
        }
    }

    /// Whether `var` is read again after statement `position`.
    pub fn is_live_after(&self, position: usize, var: usize) -> bool {
        self.live_out
            .get(position)
            .map_or(false, |set| set.contains(&var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{Special, StmtId};

    fn stmt(id: u32, op: Op) -> Statement {
        Statement::new(StmtId(id), op)
    }

    #[test]
    fn goto_and_return_do_not_fall_through() {
        let body = vec![
            stmt(0, Op::Goto).with_special(Special::Label("end".into())),
            stmt(1, Op::Int),
            stmt(2, Op::Label).with_special(Special::Label("end".into())),
            stmt(3, Op::Return).with_left(StmtId(1)),
            stmt(4, Op::Int),
        ];
        let succ = successors(&body);
        assert_eq!(succ[0], vec![2]);
        assert_eq!(succ[1], vec![2]);
        assert!(succ[3].is_empty());
    }

    #[test]
    fn loop_carried_value_stays_live() {
        // i = 0; loop: if !(i < 3) goto end; i = i + 1 (unified); goto loop; end: print i
        let body = vec![
            stmt(0, Op::Int).with_special(Special::Int(0)),
            stmt(1, Op::Label).with_special(Special::Label("loop".into())),
            stmt(2, Op::Int).with_special(Special::Int(3)),
            stmt(3, Op::Lt).with_left(StmtId(0)).with_right(StmtId(2)),
            stmt(4, Op::NBranch)
                .with_left(StmtId(3))
                .with_special(Special::Label("end".into())),
            stmt(5, Op::Int).with_special(Special::Int(1)),
            stmt(6, Op::Plus).with_left(StmtId(0)).with_right(StmtId(5)),
            stmt(7, Op::Goto).with_special(Special::Label("loop".into())),
            stmt(8, Op::Label).with_special(Special::Label("end".into())),
            stmt(9, Op::Unify).with_left(StmtId(0)).with_right(StmtId(6)),
            stmt(10, Op::Print).with_left(StmtId(9)),
        ];
        let vars = Variables::build(&body).unwrap();
        let live = Liveness::compute(&body, &vars);
        let i = vars.of(StmtId(0)).unwrap();
        assert_eq!(vars.of(StmtId(6)), Some(i));

        assert!(live.is_live_after(6, i));
        assert!(live.is_live_after(7, i));
        assert!(live.live_in[1].contains(&i));
        assert!(!live.is_live_after(10, i));

        let three = vars.of(StmtId(2)).unwrap();
        assert!(live.is_live_after(2, three));
        assert!(!live.is_live_after(3, three));
    }
}
