// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Exception flow on top of the points-to solver.
//!
//! Objects pointed to by the operand of a `throw` are thrown by that
//! statement. A handler guarding the statement whose catch type is a
//! supertype of an object's type binds it to the handler's catch variable;
//! the objects no handler catches escape the method and are thrown again
//! by every invoke statement calling it.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::ir::call_site::CallKind;
use crate::ir::program::{MethodId, Stmt, StmtId, VarId};
use crate::pta::cs_manager::{CSCallSiteId, CSMethodId, Pointer, PointerId};
use crate::pta::heap_model::ObjId;
use crate::pta::solver::Solver;
use crate::pta::worklist::CallEdge;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;

/// Key of the published uncaught exceptions.
pub const UNCAUGHT_EXCEPTIONS: &str = "uncaught-exceptions";

/// Exception objects escaping each method, merged over its contexts.
pub type ThrowResult = BTreeMap<MethodId, BTreeSet<ObjId>>;

#[derive(Default)]
struct MethodThrows {
    /// Objects thrown by each statement, by statement index.
    thrown: HashMap<usize, PointsTo>,
    uncaught: PointsTo,
}

#[derive(Default)]
pub struct ExceptionAnalysis {
    /// `throw` statements by operand.
    throw_stmts: HashMap<VarId, Vec<StmtId>>,
    throws: HashMap<CSMethodId, MethodThrows>,
    worklist: VecDeque<(CSMethodId, StmtId, PointsTo)>,
}

impl ExceptionAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    fn propagate(&mut self, solver: &mut Solver) {
        while let Some((cs_method, stmt, exceptions)) = self.worklist.pop_front() {
            let diff = self
                .throws
                .entry(cs_method)
                .or_default()
                .thrown
                .entry(stmt.index)
                .or_default()
                .union_diff(&exceptions);
            if diff.is_empty() {
                continue;
            }
            let uncaught = catch_locally(solver, cs_method, stmt, diff);
            if uncaught.is_empty() {
                continue;
            }
            let new_uncaught = self.throws.entry(cs_method).or_default().uncaught.union_diff(&uncaught);
            if new_uncaught.is_empty() {
                continue;
            }
            for edge in solver.call_graph().get_callers_of(cs_method) {
                if edge.kind == CallKind::Other {
                    continue;
                }
                if let Some(invoke) = invoke_stmt(solver, edge.callsite) {
                    self.worklist.push_back((edge.caller, invoke, new_uncaught.clone()));
                }
            }
        }
    }
}

/// Binds the objects a handler of `stmt` catches to the handler's catch
/// variable and returns the others.
fn catch_locally(solver: &mut Solver, cs_method: CSMethodId, stmt: StmtId, mut exceptions: PointsTo) -> PointsTo {
    let program = solver.program().clone();
    let cid = solver.cs_manager().cs_method(cs_method).cid;
    for handler in program.handlers_of(stmt) {
        let target = StmtId {
            method: stmt.method,
            index: handler.handler,
        };
        let Stmt::Catch { lhs } = program.stmt(target) else {
            continue;
        };
        let (caught, rest): (Vec<_>, Vec<_>) = exceptions
            .iter()
            .partition(|obj| solver.hierarchy().is_subtype(handler.catch_type, solver.cs_obj_type(*obj)));
        if !caught.is_empty() {
            trace!("{} objects caught at {}", caught.len(), program.var_sig(*lhs));
            let caught: PointsTo = caught.into_iter().collect();
            solver.add_var_points_to(cid, *lhs, &caught);
        }
        exceptions = rest.into_iter().collect();
        if exceptions.is_empty() {
            break;
        }
    }
    exceptions
}

fn invoke_stmt(solver: &Solver, callsite: CSCallSiteId) -> Option<StmtId> {
    let call_site = solver.cs_manager().cs_call_site(callsite).call_site;
    solver.program().call_site_stmt(call_site)
}

impl Plugin for ExceptionAnalysis {
    fn name(&self) -> &str {
        "exception"
    }

    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, _container: MethodId) -> Result<()> {
        if let Stmt::Throw { value } = solver.program().stmt(stmt) {
            self.throw_stmts.entry(*value).or_default().push(stmt);
        }
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        let Pointer::Var { cid, var } = *solver.cs_manager().pointer(pointer) else {
            return Ok(());
        };
        let Some(stmts) = self.throw_stmts.get(&var) else {
            return Ok(());
        };
        let method = solver.program().var(var).method;
        let cs_method = solver.cs_manager_mut().get_cs_method(cid, method);
        for stmt in stmts {
            self.worklist.push_back((cs_method, *stmt, diff.clone()));
        }
        self.propagate(solver);
        Ok(())
    }

    fn on_new_call_edge(&mut self, solver: &mut Solver, edge: &CallEdge) -> Result<()> {
        if edge.kind == CallKind::Other {
            return Ok(());
        }
        let uncaught = match self.throws.get(&edge.callee) {
            Some(throws) if !throws.uncaught.is_empty() => throws.uncaught.clone(),
            _ => return Ok(()),
        };
        let Some(invoke) = invoke_stmt(solver, edge.callsite) else {
            return Ok(());
        };
        let cid = solver.cs_manager().cs_call_site(edge.callsite).cid;
        let caller = solver.cs_manager_mut().get_cs_method(cid, invoke.method);
        self.worklist.push_back((caller, invoke, uncaught));
        self.propagate(solver);
        Ok(())
    }

    fn on_finish(&mut self, solver: &mut Solver) -> Result<()> {
        let mut result = ThrowResult::new();
        for (cs_method, throws) in &self.throws {
            if throws.uncaught.is_empty() {
                continue;
            }
            let method = solver.cs_manager().cs_method(*cs_method).method;
            let objs = result.entry(method).or_default();
            objs.extend(throws.uncaught.iter().map(|obj| solver.cs_manager().cs_obj(obj).obj));
        }
        info!("{} methods may throw uncaught exceptions", result.len());
        solver.publish_result(UNCAUGHT_EXCEPTIONS, Box::new(result));
        Ok(())
    }
}
