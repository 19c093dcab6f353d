//! Property tests for the liveness solver and DCE on generated functions.

use cranelift_entity::SecondaryMap;
use deadwood_ir::{
    BlockRef, CmpPred, Function, InstBuilder, InstRef, Opcode, ValueRef, print_function,
    validate_function,
};
use deadwood_passes::{
    DceConfig, DceStrategy, LiveSet, LivenessSolver, SolverState, compute_liveness,
    eliminate_dead_code_with_config,
};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Pure(u8, usize, usize),
    Copy(i64),
    Call(usize),
    Store(usize, usize),
    /// A pure instruction without a result.
    Void(usize),
}

#[derive(Debug, Clone)]
struct Diamond {
    cond: usize,
    left: Vec<Step>,
    right: Vec<Step>,
    join: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Shape {
    entry: Vec<Step>,
    diamond: Option<Diamond>,
    ret: Option<usize>,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..4u8, any::<usize>(), any::<usize>()).prop_map(|(k, a, b)| Step::Pure(k, a, b)),
        2 => (-5i64..5).prop_map(Step::Copy),
        1 => any::<usize>().prop_map(Step::Call),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::Store(a, b)),
        1 => any::<usize>().prop_map(Step::Void),
    ]
}

fn shape() -> impl Strategy<Value = Shape> {
    let diamond = (
        any::<usize>(),
        vec(step(), 0..5),
        vec(step(), 0..5),
        vec(step(), 0..5),
    )
        .prop_map(|(cond, left, right, join)| Diamond {
            cond,
            left,
            right,
            join,
        });
    (vec(step(), 0..8), option::of(diamond), option::of(any::<usize>())).prop_map(
        |(entry, diamond, ret)| Shape {
            entry,
            diamond,
            ret,
        },
    )
}

fn pick(pool: &[ValueRef], idx: usize) -> ValueRef {
    pool[idx % pool.len()]
}

fn emit(func: &mut Function, block: BlockRef, pool: &mut Vec<ValueRef>, step: &Step) {
    let inst = match *step {
        Step::Pure(kind, a, b) => {
            let opcode = [
                Opcode::Add,
                Opcode::Sub,
                Opcode::Mul,
                Opcode::Cmp(CmpPred::Lt),
            ][kind as usize % 4];
            InstBuilder::new(opcode)
                .operand(pick(pool, a))
                .operand(pick(pool, b))
                .result()
                .append(func, block)
        }
        Step::Copy(n) => InstBuilder::new(Opcode::Copy)
            .imm(n)
            .result()
            .append(func, block),
        Step::Call(a) => InstBuilder::new(Opcode::Call)
            .callee("sink")
            .operand(pick(pool, a))
            .result()
            .append(func, block),
        Step::Store(a, b) => InstBuilder::new(Opcode::Store)
            .operand(pick(pool, a))
            .operand(pick(pool, b))
            .append(func, block),
        Step::Void(a) => InstBuilder::new(Opcode::Neg)
            .operand(pick(pool, a))
            .append(func, block),
    };
    if let Some(v) = func.inst_result(inst) {
        pool.push(v);
    }
}

fn build(shape: &Shape) -> Function {
    let mut func = Function::new("generated");
    let mut pool = vec![func.add_param(Some("p")), func.add_param(Some("q"))];
    let entry = func.create_block(Some("entry"));
    for step in &shape.entry {
        emit(&mut func, entry, &mut pool, step);
    }

    let mut exit_block = entry;
    if let Some(diamond) = &shape.diamond {
        let left = func.create_block(Some("left"));
        let right = func.create_block(Some("right"));
        let join = func.create_block(Some("join"));
        InstBuilder::new(Opcode::CondBr)
            .operand(pick(&pool, diamond.cond))
            .successor(left)
            .successor(right)
            .append(&mut func, entry);

        let arm = |func: &mut Function, block: BlockRef, steps: &[Step]| {
            let mut arm_pool = pool.clone();
            for step in steps {
                emit(func, block, &mut arm_pool, step);
            }
            InstBuilder::new(Opcode::Br)
                .successor(join)
                .append(func, block);
            arm_pool[arm_pool.len() - 1]
        };
        let from_left = arm(&mut func, left, &diamond.left);
        let from_right = arm(&mut func, right, &diamond.right);

        let phi = InstBuilder::new(Opcode::Phi)
            .incoming(from_left, left)
            .incoming(from_right, right)
            .result()
            .append(&mut func, join);
        pool.extend(func.inst_result(phi));
        for step in &diamond.join {
            emit(&mut func, join, &mut pool, step);
        }
        exit_block = join;
    }

    let ret = match shape.ret {
        Some(idx) => InstBuilder::new(Opcode::Ret).operand(pick(&pool, idx)),
        None => InstBuilder::new(Opcode::Ret),
    };
    ret.append(&mut func, exit_block);
    func
}

type Snapshot = (SecondaryMap<InstRef, LiveSet>, SecondaryMap<InstRef, LiveSet>);

fn snapshot(func: &Function, solver: &LivenessSolver<'_>) -> Snapshot {
    let mut live_in = SecondaryMap::new();
    let mut live_out = SecondaryMap::new();
    for inst in func.insts() {
        live_in[inst] = solver.live_in(inst).clone();
        live_out[inst] = solver.live_out(inst).clone();
    }
    (live_in, live_out)
}

fn attached_effects(func: &Function) -> Vec<InstRef> {
    func.insts()
        .filter(|&i| {
            func.may_have_side_effects(i) || func.is_terminator(i) || func.is_phi(i)
        })
        .collect()
}

proptest! {
    #[test]
    fn live_sets_only_grow(shape in shape()) {
        let func = build(&shape);
        let mut solver = LivenessSolver::new(&func);
        let mut prev = snapshot(&func, &solver);
        while solver.step() != SolverState::Converged {
            let next = snapshot(&func, &solver);
            for inst in func.insts() {
                prop_assert!(prev.0[inst].is_subset(&next.0[inst]));
                prop_assert!(prev.1[inst].is_subset(&next.1[inst]));
            }
            prev = next;
        }
    }

    #[test]
    fn converged_solver_is_a_fixed_point(shape in shape()) {
        let func = build(&shape);
        let mut solver = LivenessSolver::new(&func);
        while solver.step() != SolverState::Converged {}
        let converged = snapshot(&func, &solver);

        let again = compute_liveness(&func);
        for inst in func.insts() {
            prop_assert_eq!(&converged.0[inst], again.live_in(inst));
            prop_assert_eq!(&converged.1[inst], again.live_out(inst));
        }
    }

    #[test]
    fn iterations_are_bounded(shape in shape()) {
        let func = build(&shape);
        let liveness = compute_liveness(&func);
        let bound = func.num_insts() * func.num_values() + 1;
        prop_assert!(
            liveness.iterations() <= bound,
            "{} passes > bound {}\n{}",
            liveness.iterations(),
            bound,
            print_function(&func)
        );
    }

    #[test]
    fn own_result_never_live_in(shape in shape()) {
        let func = build(&shape);
        let liveness = compute_liveness(&func);
        for inst in func.insts() {
            if let Some(v) = func.inst_result(inst) {
                prop_assert!(!liveness.live_in(inst).contains(v));
            }
        }
    }

    #[test]
    fn dce_keeps_effects_and_leaves_valid_ir(shape in shape()) {
        let mut func = build(&shape);
        let kept = attached_effects(&func);

        let result = eliminate_dead_code_with_config(&mut func, DceConfig::default());

        prop_assert!(result.reached_fixpoint);
        prop_assert_eq!(attached_effects(&func), kept);
        let validation = validate_function(&func);
        prop_assert!(validation.is_ok(), "{}\n{}", validation, print_function(&func));
    }

    #[test]
    fn strategies_agree_on_acyclic_functions(shape in shape()) {
        let mut by_liveness = build(&shape);
        let mut by_uses = build(&shape);

        eliminate_dead_code_with_config(&mut by_liveness, DceConfig::default());
        eliminate_dead_code_with_config(
            &mut by_uses,
            DceConfig { strategy: DceStrategy::UseChain, max_rounds: None },
        );

        prop_assert_eq!(print_function(&by_liveness), print_function(&by_uses));
    }
}
