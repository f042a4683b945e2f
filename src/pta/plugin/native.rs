// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Models of native methods the program declares without a body.

use std::collections::HashMap;

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::graph::pfg::FlowKind;
use crate::ir::call_site::CallKind;
use crate::ir::context::ContextId;
use crate::ir::program::{CallSiteId, MethodId, Stmt, StmtId, VarId};
use crate::pta::cs_manager::{Pointer, PointerId};
use crate::pta::solver::Solver;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;

const SRC: usize = 0;
const DEST: usize = 2;

/// Models `arraycopy(src, srcPos, dest, destPos, length)`: the elements of
/// every source array flow into every destination array, filtered by the
/// destination's element type.
pub struct ArrayCopyModel {
    signature: String,
    arraycopy: Option<MethodId>,
    /// Copying call sites by source variable.
    src_sites: HashMap<VarId, Vec<CallSiteId>>,
    /// Copying call sites by destination variable.
    dest_sites: HashMap<VarId, Vec<CallSiteId>>,
}

impl ArrayCopyModel {
    pub fn new(signature: &str) -> Self {
        ArrayCopyModel {
            signature: signature.to_string(),
            arraycopy: None,
            src_sites: HashMap::new(),
            dest_sites: HashMap::new(),
        }
    }

    /// Links the arrays copied at `call_site` in context `cid`. A missing
    /// side is read from the solver.
    fn copy_at(
        solver: &mut Solver,
        cid: ContextId,
        call_site: CallSiteId,
        srcs: Option<&PointsTo>,
        dests: Option<&PointsTo>,
    ) {
        let args = &solver.program().call_site(call_site).args;
        let (src, dest) = (args[SRC], args[DEST]);
        let srcs = match srcs {
            Some(pts) => pts.clone(),
            None => {
                let pointer = solver.cs_manager_mut().get_cs_var(cid, src);
                solver.points_to(pointer)
            }
        };
        let dests = match dests {
            Some(pts) => pts.clone(),
            None => {
                let pointer = solver.cs_manager_mut().get_cs_var(cid, dest);
                solver.points_to(pointer)
            }
        };
        let program = solver.program().clone();
        for src_array in srcs.iter() {
            if program.element_type(solver.cs_obj_type(src_array)).is_none() {
                continue;
            }
            let src_index = solver.cs_manager_mut().get_array_index(src_array);
            for dest_array in dests.iter() {
                let Some(elem_type) = program.element_type(solver.cs_obj_type(dest_array)) else {
                    continue;
                };
                let dest_index = solver.cs_manager_mut().get_array_index(dest_array);
                solver.add_pfg_edge(src_index, dest_index, FlowKind::Other, Some(elem_type));
            }
        }
    }
}

impl Plugin for ArrayCopyModel {
    fn name(&self) -> &str {
        "arraycopy"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        self.arraycopy = solver.program().find_method(&self.signature);
        if self.arraycopy.is_none() {
            warn!("Native method {} not found, array copies are not modeled", self.signature);
        }
        Ok(())
    }

    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, _container: MethodId) -> Result<()> {
        let Some(arraycopy) = self.arraycopy else {
            return Ok(());
        };
        let program = solver.program();
        let Stmt::Invoke { call_site } = program.stmt(stmt) else {
            return Ok(());
        };
        let def = program.call_site(*call_site);
        if def.kind != CallKind::Static || solver.hierarchy().resolve_method(&def.method_ref) != Some(arraycopy) {
            return Ok(());
        }
        if def.args.len() <= DEST {
            warn!("Ignoring array copy {} with {} arguments", program.call_site_sig(*call_site), def.args.len());
            return Ok(());
        }
        self.src_sites.entry(def.args[SRC]).or_default().push(*call_site);
        self.dest_sites.entry(def.args[DEST]).or_default().push(*call_site);
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        let Pointer::Var { cid, var } = *solver.cs_manager().pointer(pointer) else {
            return Ok(());
        };
        for call_site in self.src_sites.get(&var).cloned().unwrap_or_default() {
            Self::copy_at(solver, cid, call_site, Some(diff), None);
        }
        for call_site in self.dest_sites.get(&var).cloned().unwrap_or_default() {
            Self::copy_at(solver, cid, call_site, None, Some(diff));
        }
        Ok(())
    }
}
