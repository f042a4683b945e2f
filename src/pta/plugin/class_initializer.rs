// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use super::Plugin;
use crate::ir::call_site::CallKind;
use crate::ir::program::{ClassId, MethodId, Stmt, StmtId};
use crate::pta::solver::Solver;

/// Makes class initializers reachable where the runtime would run them:
/// for the classes of entry methods, on allocation, on static field access
/// and on static invocation.
#[derive(Default)]
pub struct ClassInitializer;

impl ClassInitializer {
    pub fn new() -> Self {
        ClassInitializer
    }

    fn triggered_class(solver: &Solver, stmt: &Stmt) -> Option<ClassId> {
        let program = solver.program();
        match stmt {
            Stmt::New { ty, .. } => program.class_of_type(*ty),
            Stmt::LoadField { base: None, field, .. } | Stmt::StoreField { base: None, field, .. } => {
                Some(program.field(*field).class)
            }
            Stmt::Invoke { call_site } => {
                let def = program.call_site(*call_site);
                if def.kind != CallKind::Static {
                    return None;
                }
                let class = match solver.hierarchy().resolve_method(&def.method_ref) {
                    Some(callee) => program.method(callee).class,
                    None => def.method_ref.class,
                };
                Some(class)
            }
            _ => None,
        }
    }
}

impl Plugin for ClassInitializer {
    fn name(&self) -> &str {
        "class-initializer"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        let program = solver.program().clone();
        if let Some(main) = program.main_method {
            solver.initialize_class(program.method(main).class);
        }
        if solver.options().implicit_entries {
            for method in &program.implicit_entries {
                solver.initialize_class(program.method(*method).class);
            }
        }
        Ok(())
    }

    fn on_new_stmt(&mut self, solver: &mut Solver, stmt: StmtId, _container: MethodId) -> Result<()> {
        let program = solver.program().clone();
        if let Some(class) = Self::triggered_class(solver, program.stmt(stmt)) {
            solver.initialize_class(class);
        }
        Ok(())
    }
}
