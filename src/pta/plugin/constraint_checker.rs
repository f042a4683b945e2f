// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::ir::program::MethodId;
use crate::pta::cs_manager::{CSMethodId, Pointer, PointerId};
use crate::pta::solver::Solver;
use crate::pta::worklist::CallEdge;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;

/// Key of the published number of violations.
pub const CONSTRAINT_VIOLATIONS: &str = "constraint-violations";

/// Checks that solver events arrive in protocol order. Violations are only
/// reported, the analysis goes on.
#[derive(Default)]
pub struct ConstraintChecker {
    started: bool,
    methods: HashSet<MethodId>,
    cs_methods: HashSet<CSMethodId>,
    violations: usize,
}

impl ConstraintChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> usize {
        self.violations
    }

    fn violation(&mut self, msg: String) {
        warn!("Constraint violation: {}", msg);
        self.violations += 1;
    }
}

impl Plugin for ConstraintChecker {
    fn name(&self) -> &str {
        "constraint-checker"
    }

    fn on_start(&mut self, _solver: &mut Solver) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn on_new_method(&mut self, solver: &mut Solver, method: MethodId) -> Result<()> {
        let sig = solver.program().method_sig(method);
        if !self.started {
            self.violation(format!("{} reached before start", sig));
        }
        if !self.methods.insert(method) {
            self.violation(format!("{} reported as new twice", sig));
        }
        Ok(())
    }

    fn on_new_cs_method(&mut self, solver: &mut Solver, cs_method: CSMethodId) -> Result<()> {
        let method = solver.cs_manager().cs_method(cs_method).method;
        if !self.methods.contains(&method) {
            let sig = solver.program().method_sig(method);
            self.violation(format!("{} reached in a context before it was reached at all", sig));
        }
        if !self.cs_methods.insert(cs_method) {
            self.violation(format!("{:?} reported as new twice", cs_method));
        }
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        if diff.is_empty() {
            self.violation(format!("empty points-to set change of {:?}", pointer));
        }
        if let Pointer::Var { cid, var } = *solver.cs_manager().pointer(pointer) {
            let method = solver.program().var(var).method;
            let reached = solver
                .cs_manager()
                .find_cs_method(cid, method)
                .map_or(false, |cs_method| self.cs_methods.contains(&cs_method));
            if !reached {
                let name = solver.program().var_sig(var);
                self.violation(format!("{} gained objects before its method was reached", name));
            }
        }
        Ok(())
    }

    fn on_new_call_edge(&mut self, solver: &mut Solver, edge: &CallEdge) -> Result<()> {
        if !solver.call_graph().has_edge(&edge.callsite, edge.callee) {
            self.violation(format!("call edge {:?} reported before it was added", edge));
        }
        if !self.cs_methods.contains(&edge.callee) {
            self.violation(format!("callee of {:?} was not reached", edge));
        }
        Ok(())
    }

    fn on_finish(&mut self, solver: &mut Solver) -> Result<()> {
        if self.violations > 0 {
            warn!("{} constraint violations found", self.violations);
        }
        solver.publish_result(CONSTRAINT_VIOLATIONS, Box::new(self.violations));
        Ok(())
    }
}
