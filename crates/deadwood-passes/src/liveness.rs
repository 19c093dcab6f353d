//! Backward liveness analysis over a function's instructions.
//!
//! For every attached instruction `I`:
//!
//! ```text
//! live_in(I)  = uses(I) ∪ (live_out(I) - defs(I))
//! live_out(I) = ∪ contribution(S) over the successors S of I
//! ```
//!
//! The successor of a non-terminator is the next instruction in its block.
//! The successors of a terminator are the first instructions of its target
//! blocks. When a successor is a phi, the phi's operands are only used along
//! the edge they come from, so the contribution comes from
//! [`PhiIncomingMap`] instead of the phi's `live_in`.
//!
//! The solver runs whole-function passes in layout order until a pass leaves
//! both maps unchanged. Sets only grow, so the fixed point is reached in a
//! bounded number of passes.

use cranelift_entity::SecondaryMap;
use deadwood_ir::Function;
use deadwood_ir::refs::{BlockRef, InstRef};

use crate::live_set::LiveSet;
use crate::phi::PhiIncomingMap;

/// Lifecycle of a [`LivenessSolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    /// No pass has run; the maps are empty.
    Uninitialized,
    /// At least one pass has run and the last one changed something.
    Iterating,
    /// The last pass changed nothing.
    Converged,
}

/// Fixed-point liveness solver for one function.
///
/// Borrows the function for as long as the solver, or the [`Liveness`] it
/// produces, is alive.
pub struct LivenessSolver<'f> {
    func: &'f Function,
    phi_incoming: PhiIncomingMap,
    order: Vec<InstRef>,
    live_in: SecondaryMap<InstRef, LiveSet>,
    live_out: SecondaryMap<InstRef, LiveSet>,
    state: SolverState,
    iterations: usize,
}

impl<'f> LivenessSolver<'f> {
    pub fn new(func: &'f Function) -> Self {
        Self {
            func,
            phi_incoming: PhiIncomingMap::compute(func),
            order: func.insts().collect(),
            live_in: SecondaryMap::new(),
            live_out: SecondaryMap::new(),
            state: SolverState::Uninitialized,
            iterations: 0,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Number of whole-function passes run so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn live_in(&self, inst: InstRef) -> &LiveSet {
        &self.live_in[inst]
    }

    pub fn live_out(&self, inst: InstRef) -> &LiveSet {
        &self.live_out[inst]
    }

    /// Run one whole-function pass and return the resulting state.
    ///
    /// Once converged, further calls do nothing.
    pub fn step(&mut self) -> SolverState {
        if self.state == SolverState::Converged {
            return self.state;
        }

        let before_in = self.live_in.clone();
        let before_out = self.live_out.clone();

        for i in 0..self.order.len() {
            let inst = self.order[i];
            self.transfer(inst);
        }
        self.iterations += 1;

        let changed = self
            .order
            .iter()
            .filter(|&&inst| {
                self.live_in[inst] != before_in[inst] || self.live_out[inst] != before_out[inst]
            })
            .count();
        tracing::trace!(
            function = self.func.name(),
            pass = self.iterations,
            changed,
            "liveness pass"
        );

        self.state = if changed == 0 {
            SolverState::Converged
        } else {
            SolverState::Iterating
        };
        self.state
    }

    /// Iterate to the fixed point.
    pub fn solve(mut self) -> Liveness<'f> {
        while self.step() != SolverState::Converged {}
        tracing::debug!(
            function = self.func.name(),
            iterations = self.iterations,
            insts = self.order.len(),
            "liveness converged"
        );
        Liveness {
            func: self.func,
            phi_incoming: self.phi_incoming,
            live_in: self.live_in,
            live_out: self.live_out,
            iterations: self.iterations,
        }
    }

    fn transfer(&mut self, inst: InstRef) {
        let func = self.func;
        let mut out = LiveSet::new();

        if func.is_terminator(inst) {
            let from = func.inst_block(inst);
            for &succ in func.successor_blocks(inst) {
                if let Some(first) = func.first_inst(succ) {
                    out.union_with(&self.contribution(first, from));
                }
            }
        } else if let Some(next) = func.next_inst(inst) {
            out.union_with(&self.contribution(next, None));
        }

        let mut live_in = match func.inst_result(inst) {
            Some(def) => out.without(def),
            None => out.clone(),
        };
        if !func.is_phi(inst) {
            live_in.extend(func.value_operands(inst));
        }

        self.live_in[inst] = live_in;
        self.live_out[inst] = out;
    }

    /// What successor `succ` contributes to its predecessor's `live_out`.
    /// `edge` is the block a branch leaves from, or `None` for fallthrough
    /// within a block.
    fn contribution(&self, succ: InstRef, edge: Option<BlockRef>) -> LiveSet {
        if !self.func.is_phi(succ) {
            return self.live_in[succ].clone();
        }

        let mut set = match self.func.inst_result(succ) {
            Some(def) => self.live_out[succ].without(def),
            None => self.live_out[succ].clone(),
        };
        if let Some(incoming) = edge.and_then(|b| self.phi_incoming.get(succ, b)) {
            set.union_with(incoming);
        }
        set
    }
}

/// Converged liveness of a function.
///
/// Holds a shared borrow of the function, so the function cannot be mutated
/// while this is alive.
pub struct Liveness<'f> {
    func: &'f Function,
    phi_incoming: PhiIncomingMap,
    live_in: SecondaryMap<InstRef, LiveSet>,
    live_out: SecondaryMap<InstRef, LiveSet>,
    iterations: usize,
}

impl<'f> Liveness<'f> {
    pub fn function(&self) -> &'f Function {
        self.func
    }

    pub fn live_in(&self, inst: InstRef) -> &LiveSet {
        &self.live_in[inst]
    }

    pub fn live_out(&self, inst: InstRef) -> &LiveSet {
        &self.live_out[inst]
    }

    pub fn phi_incoming(&self) -> &PhiIncomingMap {
        &self.phi_incoming
    }

    /// Passes the solver ran, including the final unchanged one.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the result of `inst` is still needed after it executes.
    /// Instructions without a result are never live.
    pub fn result_is_live(&self, inst: InstRef) -> bool {
        self.func
            .inst_result(inst)
            .is_some_and(|v| self.live_out[inst].contains(v))
    }
}

/// Solve liveness for `func` to the fixed point.
pub fn compute_liveness(func: &Function) -> Liveness<'_> {
    LivenessSolver::new(func).solve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadwood_ir::ValueRef;
    use deadwood_ir::parser::parse_test_function;

    fn value(func: &Function, name: &str) -> ValueRef {
        func.values()
            .find(|&v| func.value_name(v) == Some(name))
            .unwrap()
    }

    fn block(func: &Function, label: &str) -> BlockRef {
        func.layout()
            .iter()
            .copied()
            .find(|&b| func.block_label(b) == Some(label))
            .unwrap()
    }

    fn def(func: &Function, name: &str) -> InstRef {
        match func.value_def(value(func, name)) {
            deadwood_ir::ValueDef::InstResult(inst) => inst,
            other => panic!("%{name} is {other}"),
        }
    }

    #[test]
    fn straight_line_block() {
        let func = parse_test_function(
            r#"
func @f() {
  ^entry:
    %x = copy 1
    %y = add %x, 1
    ret %y
}
"#,
        );
        let liveness = compute_liveness(&func);
        let x = value(&func, "x");
        let y = value(&func, "y");
        let d1 = def(&func, "x");
        let d2 = def(&func, "y");

        assert_eq!(liveness.live_out(d1).iter().collect::<Vec<_>>(), vec![x]);
        assert_eq!(liveness.live_out(d2).iter().collect::<Vec<_>>(), vec![y]);
        assert!(!liveness.live_out(d2).contains(x));
        assert!(liveness.live_in(d1).is_empty());
        assert!(!liveness.live_in(d1).contains(x));
        assert!(liveness.result_is_live(d1));
    }

    #[test]
    fn phi_operands_live_only_on_their_edge() {
        let func = parse_test_function(
            r#"
func @f(%a, %b, %c) {
  ^entry:
    condbr %c [^b1, ^b2]
  ^b1:
    br [^b3]
  ^b2:
    br [^b3]
  ^b3:
    %p = phi [%a, ^b1], [%b, ^b2]
    ret %p
}
"#,
        );
        let liveness = compute_liveness(&func);
        let a = value(&func, "a");
        let b = value(&func, "b");
        let c = value(&func, "c");
        let p = value(&func, "p");
        let term1 = func.last_inst(block(&func, "b1")).unwrap();
        let term2 = func.last_inst(block(&func, "b2")).unwrap();
        let entry_term = func.last_inst(block(&func, "entry")).unwrap();

        assert!(liveness.live_out(term1).contains(a));
        assert!(!liveness.live_out(term1).contains(b));
        assert!(liveness.live_out(term2).contains(b));
        assert!(!liveness.live_out(term2).contains(a));

        // Both operands flow back to the branch that reaches either edge.
        let entry_in: Vec<_> = liveness.live_in(entry_term).iter().collect();
        assert_eq!(entry_in, vec![a, b, c]);

        // The phi's own result is never live into a predecessor.
        assert!(!liveness.live_out(term1).contains(p));
    }

    #[test]
    fn loop_carried_value_stays_live_around_back_edge() {
        let func = parse_test_function(
            r#"
func @count(%n) {
  ^entry:
    br [^head]
  ^head:
    %i = phi [0, ^entry], [%next, ^body]
    %done = cmp.ge %i, %n
    condbr %done [^exit, ^body]
  ^body:
    %next = add %i, 1
    br [^head]
  ^exit:
    ret %i
}
"#,
        );
        let liveness = compute_liveness(&func);
        let n = value(&func, "n");
        let i = value(&func, "i");
        let next = value(&func, "next");
        let body_br = func.last_inst(block(&func, "body")).unwrap();
        let entry_br = func.last_inst(block(&func, "entry")).unwrap();

        let back_edge: Vec<_> = liveness.live_out(body_br).iter().collect();
        assert_eq!(back_edge, vec![n, next]);
        let into_loop: Vec<_> = liveness.live_out(entry_br).iter().collect();
        assert_eq!(into_loop, vec![n]);
        assert!(liveness.live_out(def(&func, "done")).contains(i));
        assert!(liveness.iterations() >= 2);
    }

    #[test]
    fn consecutive_phis_share_the_edge() {
        let func = parse_test_function(
            r#"
func @swap(%a, %b, %c) {
  ^entry:
    br [^head]
  ^head:
    %x = phi [%a, ^entry], [%y, ^head]
    %y = phi [%b, ^entry], [%x, ^head]
    condbr %c [^head, ^exit]
  ^exit:
    %s = sub %x, %y
    ret %s
}
"#,
        );
        let liveness = compute_liveness(&func);
        let head = block(&func, "head");
        let px = func.first_inst(head).unwrap();
        let py = func.next_inst(px).unwrap();
        let entry_br = func.last_inst(block(&func, "entry")).unwrap();
        let head_br = func.last_inst(head).unwrap();

        let into_head: Vec<_> = liveness.live_out(entry_br).iter().collect();
        assert_eq!(
            into_head,
            vec![value(&func, "a"), value(&func, "b"), value(&func, "c")]
        );
        // The back edge needs the old values of both phis.
        assert!(liveness.live_out(head_br).contains(value(&func, "x")));
        assert!(liveness.live_out(head_br).contains(value(&func, "y")));
        // Between the phis the first phi's result is already live.
        assert!(liveness.live_out(px).contains(value(&func, "x")));
        assert!(liveness.live_out(py).contains(value(&func, "y")));
    }

    #[test]
    fn solver_walks_through_states() {
        let func = parse_test_function("func @f(%a) {\n  %b = neg %a\n  ret %b\n}");
        let mut solver = LivenessSolver::new(&func);
        assert_eq!(solver.state(), SolverState::Uninitialized);
        assert_eq!(solver.iterations(), 0);

        let mut last = solver.state();
        while last != SolverState::Converged {
            last = solver.step();
            assert_ne!(last, SolverState::Uninitialized);
        }
        let passes = solver.iterations();
        assert_eq!(solver.step(), SolverState::Converged);
        assert_eq!(solver.iterations(), passes);
    }

    #[test]
    fn re_solving_a_converged_function_is_identical() {
        let func = parse_test_function(
            r#"
func @f(%a, %c) {
  ^entry:
    %x = add %a, 1
    condbr %c [^l, ^r]
  ^l:
    br [^j]
  ^r:
    br [^j]
  ^j:
    %p = phi [%x, ^l], [%a, ^r]
    ret %p
}
"#,
        );
        let first = compute_liveness(&func);
        let second = compute_liveness(&func);
        for inst in func.insts() {
            assert_eq!(first.live_in(inst), second.live_in(inst));
            assert_eq!(first.live_out(inst), second.live_out(inst));
        }
    }

    #[test]
    fn empty_function_converges_immediately() {
        let func = Function::new("empty");
        let liveness = compute_liveness(&func);
        assert_eq!(liveness.iterations(), 1);
    }
}
