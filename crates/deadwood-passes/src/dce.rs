//! Dead Code Elimination (DCE) driven by liveness.
//!
//! An instruction is trivially dead when it is not a terminator, not a phi,
//! has no side effects, and its result is not live after it. One round
//! solves liveness, collects every dead instruction, then detaches them all.
//! Removing an instruction can make its operands dead, so the driver repeats
//! rounds until one removes nothing.
//!
//! A cheaper [`DceStrategy::UseChain`] judges deadness from the arena's
//! use-chains instead of solving liveness.

use deadwood_ir::Function;
use deadwood_ir::refs::InstRef;

use crate::liveness::{Liveness, compute_liveness};

/// How dead instructions are found in each round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DceStrategy {
    /// Solve liveness and remove instructions whose result is not live out.
    #[default]
    Liveness,
    /// Remove instructions whose result has no remaining uses.
    UseChain,
}

/// Configuration for dead code elimination.
#[derive(Debug, Clone, Copy, Default)]
pub struct DceConfig {
    pub strategy: DceStrategy,
    /// Maximum rounds before giving up. `None` runs to the fixpoint.
    pub max_rounds: Option<usize>,
}

/// Result of running dead code elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DceResult {
    /// Total number of instructions removed.
    pub removed_count: usize,
    /// Number of rounds run, including the final one that removed nothing.
    pub rounds: usize,
    /// Whether fixpoint was reached (no more changes possible).
    pub reached_fixpoint: bool,
}

/// Instructions DCE may never remove, whatever their liveness.
fn is_removable(func: &Function, inst: InstRef) -> bool {
    !func.is_terminator(inst) && !func.is_phi(inst) && !func.may_have_side_effects(inst)
}

/// Check if an instruction is dead according to converged liveness.
///
/// Void instructions without side effects are dead.
pub fn is_trivially_dead(liveness: &Liveness<'_>, inst: InstRef) -> bool {
    is_removable(liveness.function(), inst) && !liveness.result_is_live(inst)
}

/// Check if an instruction is dead according to the use-chain.
pub fn is_unused(func: &Function, inst: InstRef) -> bool {
    is_removable(func, inst) && func.inst_result(inst).is_none_or(|v| !func.has_uses(v))
}

/// One liveness round: solve, collect the dead, detach them.
///
/// Returns `true` iff at least one instruction was removed.
pub fn remove_dead_instructions(func: &mut Function) -> bool {
    sweep(func, DceStrategy::Liveness) > 0
}

/// Run a single round with `strategy`. Returns the number of instructions
/// removed.
pub fn sweep(func: &mut Function, strategy: DceStrategy) -> usize {
    let removed: Vec<InstRef> = match strategy {
        DceStrategy::Liveness => {
            let worklist: Vec<InstRef> = {
                let liveness = compute_liveness(func);
                func.insts()
                    .filter(|&inst| is_trivially_dead(&liveness, inst))
                    .collect()
            };
            for &inst in &worklist {
                func.detach_inst(inst);
            }
            worklist
        }
        DceStrategy::UseChain => {
            // Reverse order lets one round clear a whole chain within a block.
            let candidates: Vec<InstRef> = func.insts().collect();
            let mut removed = Vec::new();
            for &inst in candidates.iter().rev() {
                if is_unused(func, inst) {
                    func.detach_inst(inst);
                    removed.push(inst);
                }
            }
            removed
        }
    };

    for &inst in &removed {
        tracing::trace!(function = func.name(), %inst, opcode = %func.inst(inst).opcode, "removed");
    }
    removed.len()
}

/// Eliminate dead code from a function using default configuration.
pub fn eliminate_dead_code(func: &mut Function) -> DceResult {
    eliminate_dead_code_with_config(func, DceConfig::default())
}

/// Eliminate dead code with custom configuration.
pub fn eliminate_dead_code_with_config(func: &mut Function, config: DceConfig) -> DceResult {
    let mut total_removed = 0;
    let mut rounds = 0;

    loop {
        if config.max_rounds.is_some_and(|max| rounds >= max) {
            tracing::warn!(
                function = func.name(),
                rounds,
                removed = total_removed,
                "DCE stopped before reaching a fixpoint"
            );
            return DceResult {
                removed_count: total_removed,
                rounds,
                reached_fixpoint: false,
            };
        }

        let removed = sweep(func, config.strategy);
        rounds += 1;
        tracing::debug!(function = func.name(), round = rounds, removed, "DCE round");

        if removed == 0 {
            return DceResult {
                removed_count: total_removed,
                rounds,
                reached_fixpoint: true,
            };
        }
        total_removed += removed;
    }
}
