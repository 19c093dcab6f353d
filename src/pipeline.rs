//! Analysis pipeline for deadwood.
//!
//! ```text
//! source text
//!     │
//!     ▼
//! parse_module ─► Vec<Function>
//!     │
//!     ▼  (per function)
//! validate_function      [PipelineConfig::validate]
//!     │
//!     ▼
//! compute_liveness ─► rendered live-in sets   [PipelineConfig::print_liveness]
//!     │
//!     ▼
//! eliminate_dead_code ─► DceResult            [PipelineConfig::dce]
//! ```
//!
//! Liveness is rendered before DCE mutates the function, so the printed sets
//! describe the input program.

use std::path::Path;

use deadwood_ir::{Function, parse_module, validate_function};
use deadwood_passes::{
    DceConfig, DceResult, compute_liveness, eliminate_dead_code_with_config, render_liveness,
};

use crate::error::PipelineResult;

/// What the pipeline does to each function.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Run DCE with this configuration. `None` skips it.
    pub dce: Option<DceConfig>,
    /// Render live-in sets before DCE.
    pub print_liveness: bool,
    /// Reject malformed functions before any pass runs.
    pub validate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dce: Some(DceConfig::default()),
            print_liveness: true,
            validate: true,
        }
    }
}

/// Per-function outcome.
#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub name: String,
    /// Live-in sets in text form, when requested.
    pub liveness: Option<String>,
    /// DCE statistics, when DCE ran.
    pub dce: Option<DceResult>,
}

/// Functions after the pipeline ran, with a report for each.
#[derive(Debug)]
pub struct ModuleOutput {
    pub functions: Vec<Function>,
    pub reports: Vec<FunctionReport>,
}

/// Run the configured passes on a single function.
pub fn run_function(
    func: &mut Function,
    config: &PipelineConfig,
) -> PipelineResult<FunctionReport> {
    if config.validate {
        validate_function(func).into_result()?;
    }

    let liveness = if config.print_liveness {
        Some(render_liveness(&compute_liveness(func)))
    } else {
        None
    };

    let dce = config
        .dce
        .map(|dce_config| eliminate_dead_code_with_config(func, dce_config));
    if let Some(result) = &dce {
        tracing::info!(
            function = func.name(),
            removed = result.removed_count,
            rounds = result.rounds,
            "dead code eliminated"
        );
    }

    Ok(FunctionReport {
        name: func.name().to_owned(),
        liveness,
        dce,
    })
}

/// Parse `source` and run the pipeline on every function in it.
pub fn run_source(source: &str, config: &PipelineConfig) -> PipelineResult<ModuleOutput> {
    let mut functions = parse_module(source)?;
    tracing::debug!(functions = functions.len(), "parsed module");

    let reports = functions
        .iter_mut()
        .map(|func| run_function(func, config))
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok(ModuleOutput { functions, reports })
}

/// Read `path` and run the pipeline on it.
pub fn run_file(path: &Path, config: &PipelineConfig) -> PipelineResult<ModuleOutput> {
    let source = std::fs::read_to_string(path)?;
    run_source(&source, config)
}
