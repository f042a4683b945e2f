// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fs;
use std::rc::Rc;

use log::*;

use self::plugin::class_initializer::ClassInitializer;
use self::plugin::constraint_checker::ConstraintChecker;
use self::plugin::entry_point::EntryPointHandler;
use self::plugin::exception::ExceptionAnalysis;
use self::plugin::literal::{NullLiteralHandler, NumberLiteralHandler};
use self::plugin::native::ArrayCopyModel;
use self::plugin::taint::{TaintAnalysis, TaintConfig};
use self::plugin::thread::ThreadHandler;
use self::plugin::CompositePlugin;
use self::result::PointerAnalysisResult;
use self::solver::Solver;
use crate::error::{Error, Result};
use crate::ir::program::Program;
use crate::pts_set::points_to::HybridPointsToSet;
use crate::pts_set::pt_data::DiffPTData;
use crate::util::mem_watcher::MemoryWatcher;
use crate::util::options::AnalysisOptions;
use crate::util::pta_statistics::PTAStat;
use crate::util::results_dumper;

pub mod context_selector;
pub mod cs_manager;
pub mod heap_model;
pub mod param_provider;
pub mod plugin;
pub mod result;
pub mod solver;
pub mod worklist;

pub type PointsTo = HybridPointsToSet<cs_manager::CSObjId>;
pub type DiffPTDataTy = DiffPTData<cs_manager::PointerId, cs_manager::CSObjId, PointsTo>;

pub trait PointerAnalysis {
    fn analyze(&mut self) -> Result<()>;
}

/// Assembles the plugins enabled by the options.
pub fn build_plugins(options: &AnalysisOptions) -> Result<CompositePlugin> {
    let mut plugin = CompositePlugin::new();
    plugin.add_plugin(Box::new(EntryPointHandler::new()));
    plugin.add_plugin(Box::new(ClassInitializer::new()));
    if options.model_null_literals {
        plugin.add_plugin(Box::new(NullLiteralHandler::new()));
    }
    if options.model_number_literals {
        plugin.add_plugin(Box::new(NumberLiteralHandler::new()));
    }
    if options.model_exceptions {
        plugin.add_plugin(Box::new(ExceptionAnalysis::new()));
    }
    if let Some(signature) = &options.native_arraycopy {
        plugin.add_plugin(Box::new(ArrayCopyModel::new(signature)));
    }
    if let Some(thread_class) = &options.thread_class {
        plugin.add_plugin(Box::new(ThreadHandler::new(thread_class)));
    }
    if let Some(taint_config) = &options.taint_config {
        plugin.add_plugin(Box::new(TaintAnalysis::new(TaintConfig::from_file(taint_config)?)));
    }
    if options.check_constraints {
        plugin.add_plugin(Box::new(ConstraintChecker::new()));
    }
    Ok(plugin)
}

/// Runs the analysis on an already loaded program.
pub fn analyze_program(program: Rc<Program>, options: &AnalysisOptions) -> Result<PointerAnalysisResult> {
    let plugin = build_plugins(options)?;
    debug!("{} plugins enabled", plugin.len());
    let mut solver = Solver::new(program, options.clone(), Box::new(plugin))?;
    solver.analyze()?;
    Ok(solver.into_result())
}

/// Loads the input program, analyzes it and writes the requested outputs.
pub fn run_pointer_analysis(options: &AnalysisOptions) -> Result<PointerAnalysisResult> {
    let input = options
        .input
        .as_ref()
        .ok_or_else(|| Error::Config("no input program given".to_string()))?;
    info!("Loading program from {}", input);
    let program = Rc::new(Program::from_json(&fs::read_to_string(input)?)?);

    let mut mem_watcher = MemoryWatcher::new();
    mem_watcher.start();
    let result = analyze_program(program, options);
    mem_watcher.stop();
    let result = result?;

    if options.dump_stats {
        PTAStat::new(&result).dump_stats()?;
    }
    results_dumper::dump_results(&result, options)?;
    Ok(result)
}
