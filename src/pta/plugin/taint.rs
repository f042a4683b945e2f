// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Taint analysis on top of the points-to solver.
//!
//! Results of source calls point to taint objects, mock objects that are
//! propagated like any other object. Transfer methods copy the taint of one
//! argument to another. At the end, every taint object reaching a sink
//! argument is reported as a flow.

use std::collections::{BTreeSet, HashMap};
use std::fs;

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;
use log::*;
use regex::Regex;
use serde::Deserialize;

use super::Plugin;
use crate::ir::call_site::CallSiteDef;
use crate::ir::context::ContextId;
use crate::ir::program::{CallSiteId, MethodId, Program, TypeId, VarId};
use crate::pta::cs_manager::{CSCallSiteId, Pointer, PointerId};
use crate::pta::heap_model::ObjId;
use crate::pta::solver::Solver;
use crate::pta::worklist::CallEdge;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;
use crate::util::bit_vec::Idx;

/// Key of the published set of taint flows.
pub const TAINT_FLOWS: &str = "taint-flows";

const TAINT_OBJ_DESC: &str = "TaintObj";

lazy_static! {
    static ref METHOD_SIG: Regex = Regex::new(r"^<([^:]+): (.+)>$").unwrap();
}

/// A position of a call: the receiver, the result or an argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "RawArgIndex")]
pub enum ArgIndex {
    Base,
    Result,
    Arg(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArgIndex {
    Num(usize),
    Name(String),
}

impl TryFrom<RawArgIndex> for ArgIndex {
    type Error = String;

    fn try_from(raw: RawArgIndex) -> std::result::Result<Self, String> {
        match raw {
            RawArgIndex::Num(i) => Ok(ArgIndex::Arg(i)),
            RawArgIndex::Name(name) => match name.as_str() {
                "base" => Ok(ArgIndex::Base),
                "result" => Ok(ArgIndex::Result),
                _ => name
                    .parse()
                    .map(ArgIndex::Arg)
                    .map_err(|_| format!("invalid argument index '{}'", name)),
            },
        }
    }
}

impl ArgIndex {
    fn var_of(&self, call_site: &CallSiteDef) -> Option<VarId> {
        match self {
            ArgIndex::Base => call_site.recv,
            ArgIndex::Result => call_site.result,
            ArgIndex::Arg(i) => call_site.args.get(*i).copied(),
        }
    }
}

/// Results of calls to `method` are tainted with objects of type `ty`.
#[derive(Clone, Debug, Deserialize)]
pub struct Source {
    pub method: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Taint reaching argument `index` of calls to `method` is a flow.
#[derive(Clone, Debug, Deserialize)]
pub struct Sink {
    pub method: String,
    pub index: ArgIndex,
}

/// Calls to `method` pass the taint of `from` on to `to`, as objects of
/// type `ty`.
#[derive(Clone, Debug, Deserialize)]
pub struct Transfer {
    pub method: String,
    pub from: ArgIndex,
    pub to: ArgIndex,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaintConfig {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub sinks: Vec<Sink>,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
}

impl TaintConfig {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &str) -> crate::Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// A tainted value from the source call reaching the sink call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaintFlow {
    pub source: String,
    pub sink: String,
    pub index: ArgIndex,
}

/// Finds `<Class: subsignature>` among the declared methods.
fn resolve_method(solver: &Solver, sig: &str) -> Result<Option<MethodId>> {
    let caps = METHOD_SIG
        .captures(sig)
        .ok_or_else(|| anyhow!("invalid method signature '{}'", sig))?;
    let Some(class) = solver.program().find_class(&caps[1]) else {
        return Ok(None);
    };
    Ok(solver.hierarchy().get_declared_method(class, &caps[2]))
}

fn resolve_type(program: &Program, name: &str) -> Result<TypeId> {
    program
        .types
        .iter()
        .position(|ty| ty.name == name)
        .map(TypeId::new)
        .ok_or_else(|| anyhow!("unknown taint type '{}'", name))
}

pub struct TaintAnalysis {
    config: TaintConfig,
    sources: HashMap<MethodId, Vec<TypeId>>,
    sinks: HashMap<MethodId, Vec<ArgIndex>>,
    transfers: HashMap<MethodId, Vec<(ArgIndex, ArgIndex, TypeId)>>,
    /// Source call site of every taint object.
    taint_objs: HashMap<ObjId, CallSiteId>,
    /// Taint of a variable flows to the target pointers as the given type.
    transfer_edges: HashMap<PointerId, Vec<(PointerId, TypeId)>>,
    /// Sink calls met so far, with the checked position.
    sink_calls: Vec<(CSCallSiteId, ArgIndex)>,
}

impl TaintAnalysis {
    pub fn new(config: TaintConfig) -> Self {
        TaintAnalysis {
            config,
            sources: HashMap::new(),
            sinks: HashMap::new(),
            transfers: HashMap::new(),
            taint_objs: HashMap::new(),
            transfer_edges: HashMap::new(),
            sink_calls: Vec::new(),
        }
    }

    /// Taint objects among `pts`.
    fn taints_of(&self, solver: &Solver, pts: &PointsTo) -> Vec<ObjId> {
        pts.iter()
            .map(|obj| solver.cs_manager().cs_obj(obj).obj)
            .filter(|obj| self.taint_objs.contains_key(obj))
            .collect()
    }

    fn make_taint(&mut self, solver: &mut Solver, source: CallSiteId, ty: TypeId) -> PointsTo {
        let key = solver.program().call_site_sig(source);
        let obj = solver
            .heap_model_mut()
            .get_mock_object(TAINT_OBJ_DESC, &key, ty, None, false);
        self.taint_objs.insert(obj, source);
        let empty = solver.context_selector().empty_context();
        PointsTo::singleton(solver.cs_manager_mut().get_cs_obj(empty, obj))
    }

    /// Passes the given taint objects to `target` as objects of type `ty`.
    fn transfer(&mut self, solver: &mut Solver, taints: Vec<ObjId>, target: PointerId, ty: TypeId) {
        for taint in taints {
            let source = self.taint_objs[&taint];
            let pts = self.make_taint(solver, source, ty);
            solver.add_points_to(target, &pts);
        }
    }

    fn cs_var(solver: &mut Solver, cid: ContextId, index: &ArgIndex, def: &CallSiteDef) -> Option<PointerId> {
        let var = index.var_of(def)?;
        solver
            .program()
            .is_concerned(var)
            .then(|| solver.cs_manager_mut().get_cs_var(cid, var))
    }
}

impl Plugin for TaintAnalysis {
    fn name(&self) -> &str {
        "taint"
    }

    fn on_start(&mut self, solver: &mut Solver) -> Result<()> {
        let program = solver.program().clone();
        let config = self.config.clone();
        for source in &config.sources {
            match resolve_method(solver, &source.method)? {
                Some(method) => {
                    let ty = resolve_type(&program, &source.ty)?;
                    self.sources.entry(method).or_default().push(ty);
                }
                None => warn!("Taint source {} not found", source.method),
            }
        }
        for sink in &config.sinks {
            match resolve_method(solver, &sink.method)? {
                Some(method) => self.sinks.entry(method).or_default().push(sink.index),
                None => warn!("Taint sink {} not found", sink.method),
            }
        }
        for transfer in &config.transfers {
            if transfer.from == transfer.to {
                bail!("taint transfer of {} from and to the same position", transfer.method);
            }
            match resolve_method(solver, &transfer.method)? {
                Some(method) => {
                    let ty = resolve_type(&program, &transfer.ty)?;
                    self.transfers
                        .entry(method)
                        .or_default()
                        .push((transfer.from, transfer.to, ty));
                }
                None => warn!("Taint transfer {} not found", transfer.method),
            }
        }
        info!(
            "Taint analysis with {} sources, {} sinks and {} transfers",
            self.sources.len(),
            self.sinks.len(),
            self.transfers.len()
        );
        Ok(())
    }

    fn on_new_call_edge(&mut self, solver: &mut Solver, edge: &CallEdge) -> Result<()> {
        let program = solver.program().clone();
        let callee = solver.cs_manager().cs_method(edge.callee).method;
        let cs_call_site = *solver.cs_manager().cs_call_site(edge.callsite);
        let def = program.call_site(cs_call_site.call_site);

        if let Some(types) = self.sources.get(&callee).cloned() {
            if let Some(result) = Self::cs_var(solver, cs_call_site.cid, &ArgIndex::Result, def) {
                for ty in types {
                    let pts = self.make_taint(solver, cs_call_site.call_site, ty);
                    solver.add_points_to(result, &pts);
                }
            }
        }
        if let Some(indexes) = self.sinks.get(&callee) {
            for index in indexes {
                self.sink_calls.push((edge.callsite, *index));
            }
        }
        if let Some(transfers) = self.transfers.get(&callee).cloned() {
            for (from, to, ty) in transfers {
                let Some(from) = Self::cs_var(solver, cs_call_site.cid, &from, def) else {
                    continue;
                };
                let Some(to) = Self::cs_var(solver, cs_call_site.cid, &to, def) else {
                    continue;
                };
                self.transfer_edges.entry(from).or_default().push((to, ty));
                let taints = self.taints_of(solver, &solver.points_to(from));
                self.transfer(solver, taints, to, ty);
            }
        }
        Ok(())
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver, pointer: PointerId, diff: &PointsTo) -> Result<()> {
        let Some(targets) = self.transfer_edges.get(&pointer).cloned() else {
            return Ok(());
        };
        let taints = self.taints_of(solver, diff);
        if taints.is_empty() {
            return Ok(());
        }
        for (target, ty) in targets {
            self.transfer(solver, taints.clone(), target, ty);
        }
        Ok(())
    }

    fn on_finish(&mut self, solver: &mut Solver) -> Result<()> {
        let program = solver.program().clone();
        let mut flows = BTreeSet::new();
        for (callsite, index) in &self.sink_calls {
            let cs_call_site = *solver.cs_manager().cs_call_site(*callsite);
            let def = program.call_site(cs_call_site.call_site);
            let Some(var) = index.var_of(def) else {
                continue;
            };
            let Some(pointer) = solver
                .cs_manager()
                .find_pointer(&Pointer::Var { cid: cs_call_site.cid, var })
            else {
                continue;
            };
            for taint in self.taints_of(solver, &solver.points_to(pointer)) {
                flows.insert(TaintFlow {
                    source: program.call_site_sig(self.taint_objs[&taint]),
                    sink: program.call_site_sig(cs_call_site.call_site),
                    index: *index,
                });
            }
        }
        info!("Found {} taint flows", flows.len());
        for flow in &flows {
            debug!("Taint flow {} -> {} at {:?}", flow.source, flow.sink, flow.index);
        }
        solver.publish_result(TAINT_FLOWS, Box::new(flows));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_config() {
        let config = TaintConfig::from_json(
            r#"{
                "sources": [{ "method": "<S: source()>", "type": "String" }],
                "sinks": [{ "method": "<S: sink(String)>", "index": 0 }],
                "transfers": [
                    { "method": "<SB: append(String)>", "from": "0", "to": "base", "type": "SB" },
                    { "method": "<SB: toString()>", "from": "base", "to": "result", "type": "String" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.sources[0].ty, "String");
        assert_eq!(config.sinks[0].index, ArgIndex::Arg(0));
        assert_eq!(config.transfers[0].from, ArgIndex::Arg(0));
        assert_eq!(config.transfers[0].to, ArgIndex::Base);
        assert_eq!(config.transfers[1].to, ArgIndex::Result);
        assert!(TaintConfig::from_json(r#"{ "sinks": [{ "method": "<S: m()>", "index": "x" }] }"#).is_err());
    }

    #[test]
    fn method_signatures() {
        let caps = METHOD_SIG.captures("<a.B: m(int,C)>").unwrap();
        assert_eq!(&caps[1], "a.B");
        assert_eq!(&caps[2], "m(int,C)");
        assert!(METHOD_SIG.captures("a.B.m()").is_none());
    }
}
