// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ir::program::TypeId;
use crate::pta::cs_manager::PointerId;

// Unique identifiers for graph node and edges.
pub type PFGNodeId = NodeIndex<DefaultIx>;
pub type PFGEdgeId = EdgeIndex<DefaultIx>;

pub struct PFGNode {
    pointer: PointerId,
}

impl PFGNode {
    pub fn new(pointer: PointerId) -> Self {
        PFGNode { pointer }
    }

    /// Returns the pointer of the node.
    pub fn pointer(&self) -> PointerId {
        self.pointer
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowKind {
    /// `a = b`
    Assign,
    /// `a = (T) b`, filtered by the cast type.
    Cast,
    /// From `o.f` to the variable loading it.
    InstanceLoad,
    /// From the stored variable to `o.f`.
    InstanceStore,
    StaticLoad,
    StaticStore,
    /// From `o[*]` to the variable loading it.
    ArrayLoad,
    /// From the stored variable to `o[*]`, filtered by the element type.
    ArrayStore,
    /// From an argument to a callee parameter.
    CallParam,
    /// From a callee return variable to the call result.
    CallReturn,
    /// Injected by plugins.
    Other,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PFGEdge {
    pub kind: FlowKind,
    /// Only objects whose type is a subtype of this one flow along the edge.
    pub type_filter: Option<TypeId>,
}

type EdgeMap = HashMap<PFGNodeId, BTreeSet<PFGEdgeId>>;

/// The pointer flow graph. Nodes are pointers, edges say that the
/// points-to set of the source flows into the target.
pub struct PointerFlowGraph {
    /// The graph structure capturing flow relations between pointers.
    pub(crate) graph: Graph<PFGNode, PFGEdge>,
    /// A map from pointers to node id.
    pub(crate) nodes: HashMap<PointerId, PFGNodeId>,
    /// Edges already present, keyed by endpoints and label.
    edge_keys: HashSet<(PFGNodeId, PFGNodeId, PFGEdge)>,

    pub(crate) in_edges: EdgeMap,
    pub(crate) out_edges: EdgeMap,
}

impl Default for PointerFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerFlowGraph {
    /// Constructor
    pub fn new() -> Self {
        PointerFlowGraph {
            graph: Graph::<PFGNode, PFGEdge>::new(),
            nodes: HashMap::new(),
            edge_keys: HashSet::new(),
            in_edges: EdgeMap::new(),
            out_edges: EdgeMap::new(),
        }
    }

    /// Returns a reference to the underlying graph.
    #[inline]
    pub fn graph(&self) -> &Graph<PFGNode, PFGEdge> {
        &self.graph
    }

    /// Returns the node_id for the given pointer.
    pub fn get_node_id(&self, pointer: PointerId) -> Option<PFGNodeId> {
        self.nodes.get(&pointer).copied()
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    pub fn get_or_insert_node(&mut self, pointer: PointerId) -> PFGNodeId {
        match self.nodes.entry(pointer) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                let node_id = self.graph.add_node(PFGNode::new(pointer));
                *v.insert(node_id)
            }
        }
    }

    /// Adds an edge. Returns false if an edge with the same endpoints, kind
    /// and filter already exists.
    pub fn add_edge(&mut self, src: PointerId, dst: PointerId, edge: PFGEdge) -> bool {
        let src_id = self.get_or_insert_node(src);
        let dst_id = self.get_or_insert_node(dst);
        if !self.edge_keys.insert((src_id, dst_id, edge)) {
            return false;
        }
        let edge_id = self.graph.add_edge(src_id, dst_id, edge);
        self.out_edges.entry(src_id).or_default().insert(edge_id);
        self.in_edges.entry(dst_id).or_default().insert(edge_id);
        true
    }

    pub fn has_edge(&self, src: PointerId, dst: PointerId, edge: &PFGEdge) -> bool {
        match (self.nodes.get(&src), self.nodes.get(&dst)) {
            (Some(src_id), Some(dst_id)) => self.edge_keys.contains(&(*src_id, *dst_id, *edge)),
            _ => false,
        }
    }

    /// Outgoing edges of `pointer` as `(target, edge)` pairs, in insertion
    /// order.
    pub fn out_edges(&self, pointer: PointerId) -> Vec<(PointerId, PFGEdge)> {
        self.edges_of(pointer, &self.out_edges, |(_, dst)| dst)
    }

    /// Incoming edges of `pointer` as `(source, edge)` pairs.
    pub fn in_edges(&self, pointer: PointerId) -> Vec<(PointerId, PFGEdge)> {
        self.edges_of(pointer, &self.in_edges, |(src, _)| src)
    }

    fn edges_of(
        &self,
        pointer: PointerId,
        map: &EdgeMap,
        other_end: impl Fn((PFGNodeId, PFGNodeId)) -> PFGNodeId,
    ) -> Vec<(PointerId, PFGEdge)> {
        let Some(node_id) = self.nodes.get(&pointer) else {
            return Vec::new();
        };
        let Some(edges) = map.get(node_id) else {
            return Vec::new();
        };
        edges
            .iter()
            .filter_map(|edge_id| {
                let endpoints = self.graph.edge_endpoints(*edge_id)?;
                let weight = self.graph.edge_weight(*edge_id)?;
                Some((self.graph[other_end(endpoints)].pointer, *weight))
            })
            .collect()
    }

    /// Iterates over all edges as `(source, target, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (PointerId, PointerId, &PFGEdge)> + '_ {
        self.graph.raw_edges().iter().map(move |e| {
            (
                self.graph[e.source()].pointer,
                self.graph[e.target()].pointer,
                &e.weight,
            )
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::bit_vec::Idx;

    #[test]
    fn edges_are_idempotent() {
        let mut pfg = PointerFlowGraph::new();
        let (a, b) = (PointerId::new(0), PointerId::new(1));
        let assign = PFGEdge {
            kind: FlowKind::Assign,
            type_filter: None,
        };
        let cast = PFGEdge {
            kind: FlowKind::Cast,
            type_filter: Some(TypeId::new(3)),
        };
        assert!(pfg.add_edge(a, b, assign));
        assert!(!pfg.add_edge(a, b, assign));
        assert!(pfg.add_edge(a, b, cast));
        assert_eq!(pfg.num_edges(), 2);
        assert_eq!(pfg.out_edges(a), vec![(b, assign), (b, cast)]);
        assert_eq!(pfg.in_edges(b).len(), 2);
        assert!(pfg.out_edges(b).is_empty());
        assert!(pfg.has_edge(a, b, &cast));
        assert!(!pfg.has_edge(b, a, &cast));
    }
}
