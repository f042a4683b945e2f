// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Objects for the literals the solver itself does not model.

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::ir::program::{Literal, Program, Stmt, TypeId, TypeKind};
use crate::pta::cs_manager::{CSMethod, CSMethodId, CSObjId};
use crate::pta::solver::Solver;
use crate::util::bit_vec::Idx;

/// Runs `f` on every `lhs = literal` of the method behind `cs_method`
/// whose `lhs` takes part in the analysis.
fn for_each_literal<F>(solver: &mut Solver, cs_method: CSMethodId, mut f: F)
where
    F: FnMut(&mut Solver, &CSMethod, &Stmt),
{
    let program = solver.program().clone();
    let cs = *solver.cs_manager().cs_method(cs_method);
    if solver.options().only_app && !program.is_application_method(cs.method) {
        return;
    }
    for stmt in &program.method(cs.method).body {
        if let Stmt::AssignLiteral { lhs, .. } = stmt {
            if program.is_concerned(*lhs) {
                f(solver, &cs, stmt);
            }
        }
    }
}

/// The null object needs a `Null` type so that the solver can tell it
/// apart from ordinary objects.
fn null_type(program: &Program) -> Option<TypeId> {
    program
        .types
        .iter()
        .position(|ty| ty.kind == TypeKind::Null)
        .map(TypeId::new)
}

/// Lets every variable assigned `null` point to one shared null object.
#[derive(Default)]
pub struct NullLiteralHandler {
    null_obj: Option<CSObjId>,
}

impl NullLiteralHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for NullLiteralHandler {
    fn name(&self) -> &str {
        "null-literal"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        let Some(ty) = null_type(solver.program()) else {
            warn!("No type for the null object, null literals are not modeled");
            return Ok(());
        };
        let obj = solver.heap_model_mut().get_mock_object("NullObj", "null", ty, None, false);
        let empty = solver.context_selector().empty_context();
        self.null_obj = Some(solver.cs_manager_mut().get_cs_obj(empty, obj));
        Ok(())
    }

    fn on_new_cs_method(&mut self, solver: &mut Solver, cs_method: CSMethodId) -> Result<()> {
        let Some(null_obj) = self.null_obj else {
            return Ok(());
        };
        for_each_literal(solver, cs_method, |solver, cs, stmt| {
            if let Stmt::AssignLiteral { lhs, literal: Literal::Null } = stmt {
                solver.add_var_points_to_obj(cs.cid, *lhs, null_obj);
            }
        });
        Ok(())
    }
}

/// Gives boxed number literals one object per value and type.
#[derive(Default)]
pub struct NumberLiteralHandler;

impl NumberLiteralHandler {
    pub fn new() -> Self {
        NumberLiteralHandler
    }
}

impl Plugin for NumberLiteralHandler {
    fn name(&self) -> &str {
        "number-literal"
    }

    fn on_new_cs_method(&mut self, solver: &mut Solver, cs_method: CSMethodId) -> Result<()> {
        for_each_literal(solver, cs_method, |solver, cs, stmt| {
            if let Stmt::AssignLiteral { lhs, literal: Literal::Number(value) } = stmt {
                let ty = solver.program().var(*lhs).ty;
                let obj = solver
                    .heap_model_mut()
                    .get_mock_object("NumberObj", &value.to_string(), ty, None, false);
                let empty = solver.context_selector().empty_context();
                let cs_obj = solver.cs_manager_mut().get_cs_obj(empty, obj);
                solver.add_var_points_to_obj(cs.cid, *lhs, cs_obj);
            }
        });
        Ok(())
    }
}
