// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use std::rc::Rc;

use cspta::ir::program::{Program, VarId};
use cspta::pta::analyze_program;
use cspta::pta::result::PointerAnalysisResult;
use cspta::util::options::AnalysisOptions;

pub fn options(context_sensitivity: &str) -> AnalysisOptions {
    AnalysisOptions {
        context_sensitivity: context_sensitivity.to_string(),
        ..AnalysisOptions::default()
    }
}

pub fn analyze(program: Program, options: &AnalysisOptions) -> PointerAnalysisResult {
    analyze_program(Rc::new(program), options).unwrap()
}

/// Names of the types of the objects `var` points to, sorted.
pub fn pts_types(result: &PointerAnalysisResult, var: VarId) -> Vec<String> {
    let program = result.program();
    let mut types: Vec<String> = result
        .points_to(var)
        .into_iter()
        .map(|obj| program.ty(result.heap_model().obj(obj).ty).name.clone())
        .collect();
    types.sort();
    types
}

/// The objects `var` points to, in dump form, sorted.
pub fn pts_strings(result: &PointerAnalysisResult, var: VarId) -> Vec<String> {
    let mut objs: Vec<String> = result
        .points_to(var)
        .into_iter()
        .map(|obj| result.heap_model().obj_to_string(obj))
        .collect();
    objs.sort();
    objs
}
