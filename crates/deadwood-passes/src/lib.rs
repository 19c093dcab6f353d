//! Deadwood analysis passes.
//!
//! Liveness analysis with edge-specific phi semantics over a
//! [`deadwood_ir::Function`], and dead code elimination driven by it.
//!
//! ```
//! use deadwood_ir::parse_function;
//! use deadwood_passes::{compute_liveness, eliminate_dead_code, render_liveness};
//!
//! let mut func = parse_function(
//!     "func @f(%a) {\n  %dead = add %a, 1\n  %b = neg %a\n  ret %b\n}",
//! )
//! .unwrap();
//!
//! let text = render_liveness(&compute_liveness(&func));
//! assert_eq!(text, "{%a}\n{%a}\n{%b}\n{}\n");
//!
//! let result = eliminate_dead_code(&mut func);
//! assert_eq!(result.removed_count, 1);
//! ```

pub mod dce;
pub mod live_set;
pub mod liveness;
pub mod phi;
pub mod report;

pub use dce::{
    DceConfig, DceResult, DceStrategy, eliminate_dead_code, eliminate_dead_code_with_config,
    is_trivially_dead, remove_dead_instructions,
};
pub use live_set::LiveSet;
pub use liveness::{Liveness, LivenessSolver, SolverState, compute_liveness};
pub use phi::PhiIncomingMap;
pub use report::{LivenessSink, TextSink, render_liveness, report_liveness};
