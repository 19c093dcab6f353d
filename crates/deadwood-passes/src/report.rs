//! Rendering of computed liveness.
//!
//! The text form prints the live-in set of every non-phi instruction as
//! `{%a, %b}`, one line per instruction in layout order, followed by a final
//! `{}` line for the function.

use std::fmt::{self, Write};

use deadwood_ir::Function;
use deadwood_ir::refs::InstRef;

use crate::live_set::LiveSet;
use crate::liveness::Liveness;

/// Receives live-in sets from [`report_liveness`].
pub trait LivenessSink {
    /// Called once per non-phi instruction, in layout order.
    fn live_in(&mut self, func: &Function, inst: InstRef, set: &LiveSet) -> fmt::Result;

    /// Called after the last instruction of the function.
    fn finish(&mut self, _func: &Function) -> fmt::Result {
        Ok(())
    }
}

/// Sink writing the `{%a, %b}` text form to any [`fmt::Write`].
pub struct TextSink<W> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LivenessSink for TextSink<W> {
    fn live_in(&mut self, func: &Function, _inst: InstRef, set: &LiveSet) -> fmt::Result {
        writeln!(self.out, "{}", set.display(func))
    }

    fn finish(&mut self, _func: &Function) -> fmt::Result {
        writeln!(self.out, "{{}}")
    }
}

/// Feed every non-phi instruction's live-in set to `sink`.
pub fn report_liveness(liveness: &Liveness<'_>, sink: &mut impl LivenessSink) -> fmt::Result {
    let func = liveness.function();
    for inst in func.insts() {
        if func.is_phi(inst) {
            continue;
        }
        sink.live_in(func, inst, liveness.live_in(inst))?;
    }
    sink.finish(func)
}

/// Render liveness in the text form.
pub fn render_liveness(liveness: &Liveness<'_>) -> String {
    let mut sink = TextSink::new(String::new());
    report_liveness(liveness, &mut sink).expect("fmt::Write to String never fails");
    sink.into_inner()
}
