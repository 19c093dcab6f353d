//! Liveness analysis and liveness-driven dead code elimination.
//!
//! The IR lives in [`deadwood_ir`], the analyses in [`deadwood_passes`]. This
//! crate ties them into a pipeline over IR text.

pub mod error;
pub mod pipeline;

pub use deadwood_ir as ir;
pub use deadwood_passes as passes;

pub use error::{PipelineError, PipelineErrorKind, PipelineResult};
pub use pipeline::{
    FunctionReport, ModuleOutput, PipelineConfig, run_file, run_function, run_source,
};
