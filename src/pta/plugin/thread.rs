// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::ir::call_site::CallKind;
use crate::ir::program::{CallSiteId, ClassId, MethodId, Stmt, StmtId, VarId};
use crate::pta::cs_manager::{Pointer, PointerId};
use crate::pta::solver::Solver;
use crate::pta::worklist::CallEdge;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;

const START: &str = "start()";
const RUN: &str = "run()";

/// Models `start()` on threads as a call of the thread object's `run()`.
///
/// Every `start()` call site on a subclass of the thread class gets an
/// `Other` call edge to the `run()` dispatched on each of its receiver
/// objects.
pub struct ThreadHandler {
    thread_class_name: String,
    thread_class: Option<ClassId>,
    /// `start()` call sites by receiver variable.
    start_sites: HashMap<VarId, Vec<CallSiteId>>,
}

impl ThreadHandler {
    pub fn new(thread_class_name: &str) -> Self {
        ThreadHandler {
            thread_class_name: thread_class_name.to_string(),
            thread_class: None,
            start_sites: HashMap::new(),
        }
    }
}

impl Plugin for ThreadHandler {
    fn name(&self) -> &str {
        "thread"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        self.thread_class = solver.program().find_class(&self.thread_class_name);
        if self.thread_class.is_none() {
            warn!("Thread class {} not found, threads are not modeled", self.thread_class_name);
        }
        Ok(())
    }

    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, _container: MethodId) -> Result<()> {
        let Some(thread_class) = self.thread_class else {
            return Ok(());
        };
        let program = solver.program();
        let Stmt::Invoke { call_site } = program.stmt(stmt) else {
            return Ok(());
        };
        let def = program.call_site(*call_site);
        if !def.kind.is_dispatched() || def.method_ref.subsignature != START {
            return Ok(());
        }
        let Some(recv) = def.recv else {
            return Ok(());
        };
        if solver.hierarchy().is_subclass(thread_class, def.method_ref.class) {
            debug!("Thread start at {}", program.call_site_sig(*call_site));
            self.start_sites.entry(recv).or_default().push(*call_site);
        }
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        let Some(thread_class) = self.thread_class else {
            return Ok(());
        };
        let Pointer::Var { cid, var } = *solver.cs_manager().pointer(pointer) else {
            return Ok(());
        };
        let Some(call_sites) = self.start_sites.get(&var) else {
            return Ok(());
        };
        let program = solver.program().clone();
        for call_site in call_sites {
            for thread in diff.iter() {
                let Some(class) = program.class_of_type(solver.cs_obj_type(thread)) else {
                    continue;
                };
                if !solver.hierarchy().is_subclass(thread_class, class) {
                    continue;
                }
                let Some(run) = solver.hierarchy().dispatch(class, RUN) else {
                    warn!("No run() for thread class {}", program.class(class).name);
                    continue;
                };
                let cs_call_site = solver.cs_manager_mut().get_cs_call_site(cid, *call_site);
                let callee_cid = solver.select_instance_context(cs_call_site, thread, run);
                let cs_run = solver.cs_manager_mut().get_cs_method(callee_cid, run);
                solver.add_call_edge(CallEdge::new(CallKind::Other, cs_call_site, cs_run));
                if let Some(this) = program.method(run).this {
                    solver.add_var_points_to_obj(callee_cid, this, thread);
                }
            }
        }
        Ok(())
    }
}
