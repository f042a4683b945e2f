// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use crate::ir::call_site::CallKind;
use crate::ir::program::{CallSiteId, MethodId};
use crate::pta::result::PointerAnalysisResult;

/// Call graph figures of one analysis run, contexts counted and projected
/// away.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallGraphStat {
    pub num_cs_reach_methods: usize,
    pub num_ci_reach_methods: usize,
    pub num_cs_call_edges: usize,
    pub num_ci_call_edges: usize,
    /// Resolved call sites and their CI edges, by call kind.
    pub calls_by_kind: BTreeMap<CallKind, (usize, usize)>,
}

impl CallGraphStat {
    pub fn new(result: &PointerAnalysisResult) -> Self {
        let csm = result.cs_manager();
        let call_graph = result.cs_call_graph();

        let mut ci_reach_methods: HashSet<MethodId> = HashSet::new();
        let mut num_cs_reach_methods = 0;
        for cs_method in call_graph.reachable() {
            num_cs_reach_methods += 1;
            ci_reach_methods.insert(csm.cs_method(cs_method).method);
        }

        // A call site may be resolved under several kinds, e.g. plugin edges
        // next to ordinary ones.
        let mut ci_call_edges: HashMap<(CallSiteId, CallKind), HashSet<MethodId>> = HashMap::new();
        let mut num_cs_call_edges = 0;
        for edge in call_graph.edges() {
            num_cs_call_edges += 1;
            let callsite = csm.cs_call_site(edge.callsite).call_site;
            ci_call_edges
                .entry((callsite, edge.kind))
                .or_default()
                .insert(csm.cs_method(edge.callee).method);
        }

        let mut calls_by_kind: BTreeMap<CallKind, (usize, usize)> = BTreeMap::new();
        let mut num_ci_call_edges = 0;
        for ((_, kind), callees) in &ci_call_edges {
            num_ci_call_edges += callees.len();
            let (calls, edges) = calls_by_kind.entry(*kind).or_default();
            *calls += 1;
            *edges += callees.len();
        }

        CallGraphStat {
            num_cs_reach_methods,
            num_ci_reach_methods: ci_reach_methods.len(),
            num_cs_call_edges,
            num_ci_call_edges,
            calls_by_kind,
        }
    }

    pub fn dump<W: Write>(&self, stat_writer: &mut W) -> std::io::Result<()> {
        writeln!(stat_writer, "Call Graph Statistics: ")?;
        writeln!(stat_writer, "#Reachable methods (CS): {}", self.num_cs_reach_methods)?;
        writeln!(stat_writer, "#Reachable methods (CI): {}", self.num_ci_reach_methods)?;
        writeln!(stat_writer, "#Call graph edges (CS): {}", self.num_cs_call_edges)?;
        writeln!(stat_writer, "#Call graph edges (CI): {}", self.num_ci_call_edges)?;
        for (kind, (calls, edges)) in &self.calls_by_kind {
            writeln!(stat_writer, "\t#{:?} calls: {}, #call graph edges: {}", kind, calls, edges)?;
        }
        Ok(())
    }
}
