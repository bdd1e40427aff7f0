//! Graph-coloring register allocation with iterative spilling.
//!
//! This module defines:
//! - [`allocate_method`]: the per-method build/color/spill loop.
//! - [`allocate_program`]: pins the calling convention and allocates every method.
//! - [`MethodStats`]: what one allocation produced.
//! - [`AllocError`]: allocator failures.

pub mod coloring;
pub mod spill;
pub mod variables;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::abi;
use super::liveness::Liveness;
use crate::ssa::{Op, Pin, SsaMethod, SsaProgram, StmtId};
use coloring::InterferenceGraph;
use variables::Variables;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("statement {stmt} joins values pinned to {first:?} and {second:?}")]
    ConflictingPins { stmt: StmtId, first: Pin, second: Pin },

    #[error("method '{method}' cannot be colored with {k} registers")]
    InsufficientRegisters { method: String, k: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStats {
    /// `Class.method`, or `main`.
    pub method: String,
    pub registers_used: usize,
    pub spill_slots: usize,
    pub rounds: usize,
}

pub fn qualified_name(method: &SsaMethod) -> String {
    match &method.class {
        Some(class) => format!("{}.{}", class, method.name),
        None => method.name.clone(),
    }
}

/// Allocate registers for one method, rewriting its body with spill code
/// until every unpinned variable has a color.
///
/// `next_id` supplies ids for inserted `Load`/`Store` statements and is
/// advanced past every id handed out.
pub fn allocate_method(
    method: &mut SsaMethod,
    k: usize,
    next_id: &mut u32,
) -> Result<MethodStats, AllocError> {
    let name = qualified_name(method);
    if k == 0 {
        return Err(AllocError::InsufficientRegisters { method: name, k });
    }

    abi::pin_calling_convention(method);
    for stmt in method.body.iter_mut() {
        if stmt.op == Op::VarAssg {
            stmt.right = None;
        }
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        for stmt in method.body.iter_mut().filter(|s| s.pin.is_none()) {
            stmt.register = None;
        }

        let vars = Variables::build(&method.body)?;
        let live = Liveness::compute(&method.body, &vars);
        let graph = InterferenceGraph::build(&vars, &live);
        let candidates = spill::candidates(&method.body, &vars, &live);
        let coloring = coloring::color(&graph, &vars, k, &candidates);

        if coloring.uncolored.is_empty() {
            for (v, var) in vars.iter() {
                for &m in &var.members {
                    method.body[m].register = coloring.colors[v];
                }
            }
            let stats = MethodStats {
                method: name,
                registers_used: registers_used(method),
                spill_slots: spill::next_free_slot(&method.body),
                rounds,
            };
            debug!(
                method = %stats.method,
                registers = stats.registers_used,
                spills = stats.spill_slots,
                rounds,
                "allocated"
            );
            return Ok(stats);
        }

        let spilled: Vec<usize> = coloring
            .uncolored
            .iter()
            .copied()
            .filter(|&v| candidates[v])
            .collect();
        if spilled.is_empty() {
            return Err(AllocError::InsufficientRegisters { method: name, k });
        }

        let first_slot = spill::next_free_slot(&method.body);
        let slots: BTreeMap<usize, usize> = spilled
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, first_slot + i))
            .collect();
        trace!(
            method = %name,
            round = rounds,
            spilled = ?spilled.iter().map(|&v| method.body[vars.get(v).master()].id).collect::<Vec<_>>(),
            "spilling"
        );

        let body = std::mem::take(&mut method.body);
        method.body = spill::rewrite(body, &vars, &live, &slots, next_id);
    }
}

/// Number of registers a body touches: one past the highest color.
pub fn registers_used(method: &SsaMethod) -> usize {
    method
        .body
        .iter()
        .filter_map(|s| s.register)
        .max()
        .map_or(0, |r| r + 1)
}

/// Allocate every method of the program with `k` registers.
pub fn allocate_program(program: &mut SsaProgram, k: usize) -> Result<Vec<MethodStats>, AllocError> {
    let mut next = program.next_id();
    let mut stats = Vec::new();
    for method in program.methods_mut() {
        stats.push(allocate_method(method, k, &mut next)?);
    }
    program.set_next_id(next);
    Ok(stats)
}
