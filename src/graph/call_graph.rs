// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::io::Write;

use crate::ir::call_site::CallKind;
use crate::ir::program::{CallSiteId, MethodId};
use crate::pta::cs_manager::{CSCallSiteId, CSMethodId};
use crate::util::chunked_queue::{self, ChunkedQueue};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;
// Context-sensitive call graph.
pub type CSCallGraph = CallGraph<CSMethodId, CSCallSiteId>;
// Context-insensitive projection.
pub type CICallGraph = CallGraph<MethodId, CallSiteId>;

pub trait CGFunction: Copy + Clone + PartialEq + Eq + Hash + Ord + Debug {}

impl CGFunction for MethodId {}

impl CGFunction for CSMethodId {}

pub trait CGCallSite: Copy + Clone + PartialEq + Eq + Hash + Ord + Debug {}

impl CGCallSite for CallSiteId {}

impl CGCallSite for CSCallSiteId {}

#[derive(Debug)]
pub struct CallGraphNode<F: CGFunction> {
    pub(crate) func: F,
}

impl<F: CGFunction> CallGraphNode<F> {
    pub fn new(func: F) -> Self {
        CallGraphNode { func }
    }
}

#[derive(Debug)]
pub struct CallGraphEdge<S: CGCallSite> {
    pub(crate) callsite: S,
    pub(crate) kind: CallKind,
}

impl<S: CGCallSite> CallGraphEdge<S> {
    pub fn new(callsite: S, kind: CallKind) -> Self {
        CallGraphEdge { callsite, kind }
    }
}

/// A call edge as seen by clients.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge<F, S> {
    pub callsite: S,
    pub caller: F,
    pub callee: F,
    pub kind: CallKind,
}

pub struct CallGraph<F: CGFunction, S: CGCallSite> {
    /// The graph structure capturing call relationships.
    pub graph: Graph<CallGraphNode<F>, CallGraphEdge<S>>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<F, CGNodeId>,
    /// A map from call sites to call graph edges.
    pub callsite_to_edges: HashMap<S, BTreeSet<CGEdgeId>>,
    /// Synthetic roots of the program.
    pub(crate) entry_funcs: BTreeSet<F>,
    /// A queue of reachable nodes.
    pub(crate) reach_funcs: ChunkedQueue<F>,
}

impl<F: CGFunction, S: CGCallSite> Default for CallGraph<F, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: CGFunction, S: CGCallSite> CallGraph<F, S> {
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::<CallGraphNode<F>, CallGraphEdge<S>>::new(),
            func_nodes: HashMap::new(),
            callsite_to_edges: HashMap::new(),
            entry_funcs: BTreeSet::new(),
            reach_funcs: ChunkedQueue::new(),
        }
    }

    /// Adds a reachable function. Returns false if it was already reachable.
    pub fn add_node(&mut self, func: F) -> bool {
        if let Entry::Vacant(e) = self.func_nodes.entry(func) {
            let node_id = self.graph.add_node(CallGraphNode::new(func));
            e.insert(node_id);
            self.reach_funcs.push(func);
            true
        } else {
            false
        }
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    fn get_or_insert_node(&mut self, func: F) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                self.reach_funcs.push(func);
                let node_id = self.graph.add_node(CallGraphNode::new(func));
                *v.insert(node_id)
            }
        }
    }

    /// Marks `func` as an entry of the program, making it reachable.
    pub fn add_entry(&mut self, func: F) {
        self.add_node(func);
        self.entry_funcs.insert(func);
    }

    pub fn entries(&self) -> impl Iterator<Item = F> + '_ {
        self.entry_funcs.iter().copied()
    }

    pub fn is_reachable(&self, func: F) -> bool {
        self.func_nodes.contains_key(&func)
    }

    /// Reachable functions in discovery order.
    pub fn reachable(&self) -> chunked_queue::IterCopied<F> {
        self.reach_funcs.iter_copied()
    }

    /// Return an iterator for the reachable functions.
    pub fn reach_funcs_iter(&self) -> chunked_queue::IterCopied<F> {
        self.reach_funcs.iter_copied()
    }

    /// Returns all functions called at `callsite`.
    pub fn get_callees(&self, callsite: &S) -> BTreeSet<F> {
        match self.callsite_to_edges.get(callsite) {
            Some(edges) => edges
                .iter()
                .filter_map(|edge_id| {
                    let (_, target) = self.graph.edge_endpoints(*edge_id)?;
                    Some(self.graph[target].func)
                })
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Returns true if an edge to the callee already existed for the callsite.
    pub fn has_edge(&self, callsite: &S, callee: F) -> bool {
        self.get_callees(callsite).contains(&callee)
    }

    /// Adds a new edge to the call graph.
    /// The edge is a call from `caller` to `callee` at `callsite`.
    /// Returns false if the edge already existed, and true otherwise.
    pub fn add_edge(&mut self, callsite: S, caller: F, callee: F, kind: CallKind) -> bool {
        let caller_node = self.get_or_insert_node(caller);
        let callee_node = self.get_or_insert_node(callee);
        if self.has_edge(&callsite, callee) {
            return false;
        }
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge::new(callsite, kind));
        self.callsite_to_edges.entry(callsite).or_default().insert(edge_id);
        true
    }

    /// Returns the call edges targeting `callee`.
    pub fn get_callers_of(&self, callee: F) -> Vec<Edge<F, S>> {
        let Some(node) = self.func_nodes.get(&callee) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*node, petgraph::Direction::Incoming)
            .map(|e| self.to_edge(e.source(), e.target(), e.weight()))
            .collect();
        edges.sort();
        edges
    }

    /// Returns the call edges leaving `caller`.
    pub fn get_callees_of_func(&self, caller: F) -> Vec<Edge<F, S>> {
        let Some(node) = self.func_nodes.get(&caller) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*node, petgraph::Direction::Outgoing)
            .map(|e| self.to_edge(e.source(), e.target(), e.weight()))
            .collect();
        edges.sort();
        edges
    }

    fn to_edge(&self, source: CGNodeId, target: CGNodeId, weight: &CallGraphEdge<S>) -> Edge<F, S> {
        Edge {
            callsite: weight.callsite,
            caller: self.graph[source].func,
            callee: self.graph[target].func,
            kind: weight.kind,
        }
    }

    /// Iterates over all call edges.
    pub fn edges(&self) -> impl Iterator<Item = Edge<F, S>> + '_ {
        self.graph
            .edge_references()
            .map(|e| self.to_edge(e.source(), e.target(), e.weight()))
    }

    pub fn num_funcs(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Produce a dot representation of the call graph
    /// for displaying with Graphviz.
    pub fn to_dot<W: Write>(&self, out: &mut W, func_label: impl Fn(F) -> String) -> std::io::Result<()> {
        let node_attr = |_: &Graph<CallGraphNode<F>, CallGraphEdge<S>>, (_, node): (CGNodeId, &CallGraphNode<F>)| {
            format!("label = \"{}\"", escape(&func_label(node.func)))
        };
        let edge_attr = |_: &Graph<CallGraphNode<F>, CallGraphEdge<S>>,
                         edge: petgraph::graph::EdgeReference<'_, CallGraphEdge<S>>| {
            format!("label = \"{:?}\"", edge.weight().kind)
        };
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &edge_attr,
            &node_attr,
        );
        write!(out, "{:?}", dot)
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
