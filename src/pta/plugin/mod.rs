// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Extensions observing solver events.
//!
//! Every hook receives the solver and may feed new facts back through its
//! plugin-facing methods (`add_var_points_to`, `add_call_edge`,
//! `add_entry_point`, `initialize_class`, ...). Those only queue work, so
//! every contribution goes through the same diff propagation as the
//! solver's own facts. An error returned from a hook aborts the run.

use anyhow::{Context, Result};

use super::cs_manager::{CSCallSiteId, CSMethodId, CSObjId, PointerId};
use super::solver::Solver;
use super::worklist::CallEdge;
use super::PointsTo;
use crate::ir::context::ContextId;
use crate::ir::program::{CallSiteId, MethodId, StmtId};

pub mod class_initializer;
pub mod constraint_checker;
pub mod entry_point;
pub mod exception;
pub mod literal;
pub mod native;
pub mod taint;
pub mod thread;

pub use class_initializer::ClassInitializer;
pub use constraint_checker::ConstraintChecker;
pub use entry_point::EntryPointHandler;
pub use exception::ExceptionAnalysis;
pub use literal::{NullLiteralHandler, NumberLiteralHandler};
pub use native::ArrayCopyModel;
pub use taint::TaintAnalysis;
pub use thread::ThreadHandler;

#[allow(unused_variables)]
pub trait Plugin {
    fn name(&self) -> &str;

    /// Called once before the work list is drained for the first time.
    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        Ok(())
    }

    /// Called whenever the work list runs empty. Work queued here resumes
    /// the analysis.
    fn on_phase_finish(&mut self, solver: &mut Solver) -> Result<()> {
        Ok(())
    }

    /// Called once the fixpoint is reached.
    fn on_finish(&mut self, solver: &mut Solver) -> Result<()> {
        Ok(())
    }

    /// A context-sensitive variable gained the objects in `diff`.
    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        Ok(())
    }

    fn on_new_call_edge(&mut self, solver: &mut Solver, edge: &CallEdge) -> Result<()> {
        Ok(())
    }

    /// A method became reachable in its first context.
    fn on_new_method(&mut self, solver: &mut Solver, method: MethodId) -> Result<()> {
        Ok(())
    }

    /// A statement of a newly reachable method is about to be processed.
    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, container: MethodId) -> Result<()> {
        Ok(())
    }

    fn on_new_cs_method(&mut self, solver: &mut Solver, csm: CSMethodId) -> Result<()> {
        Ok(())
    }

    /// No callee was found for `recv` at `call_site`.
    fn on_unresolved_call(
        &mut self,
        solver: &mut Solver,
        recv: CSObjId,
        cid: ContextId,
        call_site: CallSiteId,
    ) -> Result<()> {
        Ok(())
    }

    /// A dynamic call site became reachable. The solver resolves no callee
    /// for it; a plugin may link one with `add_call_edge`.
    fn on_dynamic_call(&mut self, solver: &mut Solver, call_site: CSCallSiteId) -> Result<()> {
        Ok(())
    }
}

/// Fans every event out to its children in registration order.
#[derive(Default)]
pub struct CompositePlugin {
    plugins: Vec<Box<dyn Plugin>>,
}

impl CompositePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Plugin for CompositePlugin {
    fn name(&self) -> &str {
        "composite"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_start(solver)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_phase_finish(&mut self, solver: &mut Solver) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_phase_finish(solver)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_finish(&mut self, solver: &mut Solver) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_finish(solver)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_new_points_to_set(solver, pointer, diff)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_new_call_edge(&mut self, solver: &mut Solver, edge: &CallEdge) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_new_call_edge(solver, edge)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_new_method(&mut self, solver: &mut Solver, method: MethodId) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_new_method(solver, method)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, container: MethodId) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_new_stmt(solver, stmt, container)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_new_cs_method(&mut self, solver: &mut Solver, csm: CSMethodId) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_new_cs_method(solver, csm)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_unresolved_call(
        &mut self,
        solver: &mut Solver,
        recv: CSObjId,
        cid: ContextId,
        call_site: CallSiteId,
    ) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_unresolved_call(solver, recv, cid, call_site)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }

    fn on_dynamic_call(&mut self, solver: &mut Solver, call_site: CSCallSiteId) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_dynamic_call(solver, call_site)
                .with_context(|| format!("plugin {}", plugin.name()))?;
        }
        Ok(())
    }
}
