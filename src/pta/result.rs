// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The read-only results of a finished analysis.
//!
//! Context-sensitive queries are answered directly from the solver's data.
//! The context-insensitive ones project every context away and union the
//! results, in whichever context sensitivity the analysis ran.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use super::cs_manager::{CSManager, CSObjId, Pointer, PointerId};
use super::heap_model::{HeapModel, ObjId};
use super::{DiffPTDataTy, PointsTo};
use crate::graph::call_graph::{CICallGraph, CSCallGraph};
use crate::ir::context::ContextId;
use crate::ir::program::{FieldId, MethodId, Program, VarId};
use crate::pts_set::points_to::PointsToSet;

pub struct PointerAnalysisResult {
    program: Rc<Program>,
    csm: CSManager,
    heap: HeapModel,
    pt_data: DiffPTDataTy,
    call_graph: CSCallGraph,
    named_results: HashMap<String, Box<dyn Any>>,
    context_sensitivity: String,
}

impl PointerAnalysisResult {
    pub(crate) fn new(
        program: Rc<Program>,
        csm: CSManager,
        heap: HeapModel,
        pt_data: DiffPTDataTy,
        call_graph: CSCallGraph,
        named_results: HashMap<String, Box<dyn Any>>,
        context_sensitivity: String,
    ) -> Self {
        PointerAnalysisResult {
            program,
            csm,
            heap,
            pt_data,
            call_graph,
            named_results,
            context_sensitivity,
        }
    }

    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    pub fn cs_manager(&self) -> &CSManager {
        &self.csm
    }

    pub fn heap_model(&self) -> &HeapModel {
        &self.heap
    }

    /// Description of the context selector the analysis ran with.
    pub fn context_sensitivity(&self) -> &str {
        &self.context_sensitivity
    }

    /// Points-to set of a context-sensitive pointer.
    pub fn cs_points_to(&self, pointer: PointerId) -> PointsTo {
        self.pt_data.get_propa_pts(pointer).cloned().unwrap_or_default()
    }

    /// Points-to set of `var` in context `cid`. Empty if the variable was
    /// never reached in that context.
    pub fn cs_var_points_to(&self, cid: ContextId, var: VarId) -> PointsTo {
        match self.csm.find_pointer(&Pointer::Var { cid, var }) {
            Some(pointer) => self.cs_points_to(pointer),
            None => PointsTo::new(),
        }
    }

    /// Iterates over every pointer with a non-empty points-to set.
    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, &PointsTo)> {
        self.pt_data
            .propa_iter()
            .filter(|(_, pts)| !pts.is_empty())
            .map(|(pointer, pts)| (*pointer, pts))
    }

    pub fn cs_call_graph(&self) -> &CSCallGraph {
        &self.call_graph
    }

    fn project<'a>(&self, pointers: impl Iterator<Item = &'a PointerId>) -> BTreeSet<ObjId> {
        let mut objs = BTreeSet::new();
        for pointer in pointers {
            if let Some(pts) = self.pt_data.get_propa_pts(*pointer) {
                objs.extend(pts.iter().map(|obj| self.csm.cs_obj(obj).obj));
            }
        }
        objs
    }

    /// Objects `var` may point to in any context.
    pub fn points_to(&self, var: VarId) -> BTreeSet<ObjId> {
        self.project(self.csm.cs_vars_of(var).iter())
    }

    /// Objects field `field` of `obj` may point to, over all heap contexts
    /// of `obj`.
    pub fn field_points_to(&self, obj: ObjId, field: FieldId) -> BTreeSet<ObjId> {
        let pointers = self.csm.instance_fields().iter().filter(|pointer| {
            matches!(
                self.csm.pointer(**pointer),
                Pointer::InstanceField { obj: base, field: f } if *f == field && self.csm.cs_obj(*base).obj == obj
            )
        });
        self.project(pointers)
    }

    pub fn static_field_points_to(&self, field: FieldId) -> BTreeSet<ObjId> {
        match self.csm.find_pointer(&Pointer::StaticField { field }) {
            Some(pointer) => self.project(std::iter::once(&pointer)),
            None => BTreeSet::new(),
        }
    }

    /// Objects stored in array `obj`, over all heap contexts of `obj`.
    pub fn array_points_to(&self, obj: ObjId) -> BTreeSet<ObjId> {
        let pointers = self.csm.array_indexes().iter().filter(|pointer| {
            matches!(self.csm.pointer(**pointer), Pointer::ArrayIndex { obj: base } if self.csm.cs_obj(*base).obj == obj)
        });
        self.project(pointers)
    }

    /// Methods reachable in at least one context.
    pub fn reachable_methods(&self) -> BTreeSet<MethodId> {
        self.call_graph
            .reachable()
            .map(|m| self.csm.cs_method(m).method)
            .collect()
    }

    /// The call graph with contexts projected away.
    pub fn ci_call_graph(&self) -> CICallGraph {
        let mut ci_call_graph = CICallGraph::new();
        for entry in self.call_graph.entries() {
            ci_call_graph.add_entry(self.csm.cs_method(entry).method);
        }
        for method in self.call_graph.reachable() {
            ci_call_graph.add_node(self.csm.cs_method(method).method);
        }
        for edge in self.call_graph.edges() {
            ci_call_graph.add_edge(
                self.csm.cs_call_site(edge.callsite).call_site,
                self.csm.cs_method(edge.caller).method,
                self.csm.cs_method(edge.callee).method,
                edge.kind,
            );
        }
        ci_call_graph
    }

    /// A result published by a plugin, if one of type `T` exists under
    /// `key`.
    pub fn get_named<T: 'static>(&self, key: &str) -> Option<&T> {
        self.named_results.get(key)?.downcast_ref::<T>()
    }

    pub fn pointer_to_string(&self, pointer: PointerId) -> String {
        self.csm.pointer_to_string(pointer, &self.program, &self.heap)
    }

    pub fn cs_obj_to_string(&self, obj: CSObjId) -> String {
        self.csm.cs_obj_to_string(obj, &self.program, &self.heap)
    }
}
