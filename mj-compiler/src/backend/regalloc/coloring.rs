//! Interference graph and simplify/select coloring.
//!
//! 1. Build interference edges from the live-out sets
//! 2. Remove pinned variables; they keep their pin
//! 3. Simplify: remove the lowest-index node with degree < k
//! 4. With none left, remove the highest-degree spill candidate as a
//!    potential spill
//! 5. Select: pop the stack, give each node the lowest free color, then
//!    retry the potential spills

use std::collections::BTreeSet;

use super::variables::Variables;
use crate::backend::liveness::Liveness;
use crate::ssa::Pin;

#[derive(Debug, Clone)]
pub struct InterferenceGraph {
    adj: Vec<BTreeSet<usize>>,
}

impl InterferenceGraph {
    pub fn build(vars: &Variables, live: &Liveness) -> Self {
        let mut graph = Self {
            adj: vec![BTreeSet::new(); vars.len()],
        };
        for (out, def) in live.live_out.iter().zip(&live.defs) {
            let members: Vec<usize> = out.iter().copied().collect();
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    graph.add_edge(a, b);
                }
            }
            if let Some(d) = *def {
                for &v in &members {
                    graph.add_edge(d, v);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.adj[a].insert(b);
            self.adj[b].insert(a);
        }
    }

    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    pub fn interferes(&self, a: usize, b: usize) -> bool {
        self.adj[a].contains(&b)
    }

    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.adj[v].iter().copied()
    }
}

#[derive(Debug, Clone)]
pub struct Coloring {
    /// Register color per variable; `None` for stack-only pins and spills.
    pub colors: Vec<Option<usize>>,
    /// Unpinned variables left without a color.
    pub uncolored: Vec<usize>,
}

pub fn color(
    graph: &InterferenceGraph,
    vars: &Variables,
    k: usize,
    candidates: &[bool],
) -> Coloring {
    let n = graph.len();
    let mut colors: Vec<Option<usize>> = vec![None; n];
    let mut removed = vec![false; n];

    for (v, var) in vars.iter() {
        if let Some(pin) = var.pin {
            removed[v] = true;
            if let Pin::Register(r) = pin {
                colors[v] = Some(r);
            }
        }
    }

    // Pinned neighbours that hold a register still take up a color.
    let degree = |v: usize, removed: &[bool]| {
        graph
            .neighbors(v)
            .filter(|&u| !removed[u] || vars.get(u).pinned_register().is_some())
            .count()
    };

    let mut stack = Vec::new();
    let mut potential = Vec::new();
    while let Some(first) = (0..n).find(|&v| !removed[v]) {
        let low = (first..n).find(|&v| !removed[v] && degree(v, &removed) < k);
        match low {
            Some(v) => {
                removed[v] = true;
                stack.push(v);
            }
            None => {
                let pick = |want_candidate: bool| {
                    (first..n)
                        .filter(|&v| !removed[v] && candidates[v] == want_candidate)
                        .max_by(|&a, &b| {
                            degree(a, &removed)
                                .cmp(&degree(b, &removed))
                                .then(b.cmp(&a))
                        })
                };
                let v = pick(true).or_else(|| pick(false)).unwrap_or(first);
                removed[v] = true;
                potential.push(v);
            }
        }
    }

    let lowest_free = |v: usize, colors: &[Option<usize>]| {
        let taken: BTreeSet<usize> = graph.neighbors(v).filter_map(|u| colors[u]).collect();
        (0..k).find(|c| !taken.contains(c))
    };

    while let Some(v) = stack.pop() {
        colors[v] = lowest_free(v, &colors);
    }

    // Spill code first: those variables have nowhere else to go.
    potential.sort_by_key(|&v| candidates[v]);
    for &v in &potential {
        colors[v] = lowest_free(v, &colors);
    }

    let uncolored = (0..n)
        .filter(|&v| colors[v].is_none() && vars.get(v).pin.is_none())
        .collect();

    Coloring { colors, uncolored }
}
