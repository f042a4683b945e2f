// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use log::*;

use super::Plugin;
use crate::ir::program::MethodId;
use crate::pta::param_provider::{DeclaredParamProvider, EntryPoint, SpecifiedParamProvider};
use crate::pta::solver::Solver;

/// Depth of the objects made for the parameters of implicit entries.
const IMPLICIT_ENTRY_OBJ_DEPTH: usize = 1;

/// Seeds the main method and, if enabled, the implicit entries of the
/// program.
#[derive(Default)]
pub struct EntryPointHandler;

impl EntryPointHandler {
    pub fn new() -> Self {
        EntryPointHandler
    }

    /// The first parameter of `main` holds a mock argument array whose
    /// slot holds a mock argument.
    fn main_param_provider(solver: &mut Solver, main: MethodId) -> SpecifiedParamProvider {
        let program = solver.program().clone();
        let provider = SpecifiedParamProvider::new();
        let Some(args) = program.method(main).params.first() else {
            return provider;
        };
        let args_type = program.var(*args).ty;
        let elem_type = match program.element_type(args_type) {
            Some(elem_type) if program.ty(elem_type).is_reference() => elem_type,
            _ => return provider,
        };
        let sig = program.method_sig(main);
        let heap = solver.heap_model_mut();
        let array = heap.get_mock_object("MainArgs", &sig, args_type, Some(main), false);
        let elem = heap.get_mock_object("MainArg", &sig, elem_type, Some(main), false);
        provider.add_param(0, array).add_array(array, elem)
    }
}

impl Plugin for EntryPointHandler {
    fn name(&self) -> &str {
        "entry-point"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        let program = solver.program().clone();
        match program.main_method {
            Some(main) => {
                let provider = Self::main_param_provider(solver, main);
                solver.add_entry_point(EntryPoint::new(main, Box::new(provider)))?;
            }
            None => warn!("The program has no main method"),
        }
        if solver.options().implicit_entries {
            for method in &program.implicit_entries {
                let provider = DeclaredParamProvider::new(IMPLICIT_ENTRY_OBJ_DEPTH);
                solver.add_entry_point(EntryPoint::new(*method, Box::new(provider)))?;
            }
        }
        Ok(())
    }
}
