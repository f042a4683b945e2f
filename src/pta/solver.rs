// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The context-sensitive points-to solver.
//!
//! Pointers that gained objects are queued on the work list while the new
//! objects wait in their diff set. Polling a pointer moves its diff into
//! the propagated set and pushes it along every outgoing pointer flow edge.
//! New receiver objects resolve calls, new call edges make callees
//! reachable, and reachable methods contribute their statements' edges.
//! The loop stops once no plugin adds work at a phase boundary.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::time::Instant;

use log::*;

use super::context_selector::{build_context_selector, ContextSelector};
use super::cs_manager::{CSManager, CSMethod, CSMethodId, CSObjId, CSCallSiteId, Pointer, PointerId};
use super::heap_model::{HeapModel, ObjId};
use super::param_provider::EntryPoint;
use super::plugin::Plugin;
use super::result::PointerAnalysisResult;
use super::worklist::{CallEdge, WorkList};
use super::{DiffPTDataTy, PointerAnalysis, PointsTo};
use crate::error::{Error, Result};
use crate::graph::call_graph::CSCallGraph;
use crate::graph::pfg::{FlowKind, PFGEdge, PointerFlowGraph};
use crate::ir::call_site::CallKind;
use crate::ir::class_hierarchy::ClassHierarchy;
use crate::ir::context::ContextId;
use crate::ir::program::{ClassId, FieldId, Literal, MethodId, Program, Stmt, StmtId, TypeId, TypeKind, VarId};
use crate::pts_set::points_to::PointsToSet;
use crate::util::chunked_queue::IterCopied;
use crate::util::options::AnalysisOptions;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    /// The work list is being drained.
    Running,
    /// The work list ran empty and plugins may add more work.
    PhaseBoundary,
    Finished,
}

pub struct Solver {
    program: Rc<Program>,
    hierarchy: ClassHierarchy,
    options: AnalysisOptions,
    csm: CSManager,
    heap: HeapModel,
    selector: Box<dyn ContextSelector>,
    /// Points-to data
    pt_data: DiffPTDataTy,
    /// Pointer flow graph
    pfg: PointerFlowGraph,
    /// Call graph
    call_graph: CSCallGraph,
    worklist: WorkList,
    /// Iterator for reachable context-sensitive methods
    rf_iter: IterCopied<CSMethodId>,
    /// Methods reachable in at least one context.
    reachable_methods: HashSet<MethodId>,
    initialized_classes: HashSet<ClassId>,
    /// Taken out of the solver while one of its hooks runs.
    plugin: Option<Box<dyn Plugin>>,
    state: SolverState,
    named_results: HashMap<String, Box<dyn Any>>,
}

impl Debug for Solver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "Solver".fmt(f)
    }
}

/// Constructor
impl Solver {
    pub fn new(program: Rc<Program>, options: AnalysisOptions, plugin: Box<dyn Plugin>) -> Result<Self> {
        let selector = build_context_selector(&options.context_sensitivity, program.clone())?;
        let call_graph = CSCallGraph::new();
        let rf_iter = call_graph.reach_funcs_iter();
        Ok(Solver {
            hierarchy: ClassHierarchy::new(program.clone()),
            heap: HeapModel::new(program.clone(), options.merge_string_constants),
            program,
            options,
            csm: CSManager::new(),
            selector,
            pt_data: DiffPTDataTy::new(),
            pfg: PointerFlowGraph::new(),
            call_graph,
            worklist: WorkList::new(),
            rf_iter,
            reachable_methods: HashSet::new(),
            initialized_classes: HashSet::new(),
            plugin: Some(plugin),
            state: SolverState::Uninitialized,
            named_results: HashMap::new(),
        })
    }
}

impl Solver {
    #[inline]
    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    #[inline]
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    #[inline]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    #[inline]
    pub fn cs_manager(&self) -> &CSManager {
        &self.csm
    }

    #[inline]
    pub fn cs_manager_mut(&mut self) -> &mut CSManager {
        &mut self.csm
    }

    #[inline]
    pub fn heap_model(&self) -> &HeapModel {
        &self.heap
    }

    #[inline]
    pub fn heap_model_mut(&mut self) -> &mut HeapModel {
        &mut self.heap
    }

    #[inline]
    pub fn call_graph(&self) -> &CSCallGraph {
        &self.call_graph
    }

    #[inline]
    pub fn pfg(&self) -> &PointerFlowGraph {
        &self.pfg
    }

    #[inline]
    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn context_selector(&self) -> &dyn ContextSelector {
        self.selector.as_ref()
    }

    /// Returns true if `method` is reachable in some context.
    pub fn is_reachable_method(&self, method: MethodId) -> bool {
        self.reachable_methods.contains(&method)
    }

    /// The objects `pointer` points to so far, including the ones not yet
    /// propagated.
    pub fn points_to(&self, pointer: PointerId) -> PointsTo {
        let mut pts = PointsTo::new();
        if let Some(propa) = self.pt_data.get_propa_pts(pointer) {
            pts.union(propa);
        }
        if let Some(diff) = self.pt_data.get_diff_pts(pointer) {
            pts.union(diff);
        }
        pts
    }

    /// Type of the object behind a context-sensitive object.
    #[inline]
    pub fn cs_obj_type(&self, obj: CSObjId) -> TypeId {
        self.heap.obj(self.csm.cs_obj(obj).obj).ty
    }

    /// Returns true for the object modeling the null literal.
    pub fn is_null_object(&self, obj: CSObjId) -> bool {
        matches!(self.program.ty(self.cs_obj_type(obj)).kind, TypeKind::Null)
    }

    /// Adds `pts` to the points-to set of `pointer`. Only the objects not
    /// already known are kept as its diff, and the pointer is queued if
    /// there are any.
    pub fn add_points_to(&mut self, pointer: PointerId, pts: &PointsTo) {
        if self.pt_data.union_pts_to(pointer, pts) {
            self.worklist.add_pointer_entry(pointer);
        }
    }

    pub fn add_var_points_to(&mut self, cid: ContextId, var: VarId, pts: &PointsTo) {
        let pointer = self.csm.get_cs_var(cid, var);
        self.add_points_to(pointer, pts);
    }

    pub fn add_var_points_to_obj(&mut self, cid: ContextId, var: VarId, obj: CSObjId) {
        self.add_var_points_to(cid, var, &PointsTo::singleton(obj));
    }

    pub fn add_static_field_points_to(&mut self, field: FieldId, pts: &PointsTo) {
        let pointer = self.csm.get_static_field(field);
        self.add_points_to(pointer, pts);
    }

    pub fn add_instance_field_points_to(&mut self, base: CSObjId, field: FieldId, pts: &PointsTo) {
        let pointer = self.csm.get_instance_field(base, field);
        self.add_points_to(pointer, pts);
    }

    pub fn add_array_points_to(&mut self, array: CSObjId, pts: &PointsTo) {
        let pointer = self.csm.get_array_index(array);
        self.add_points_to(pointer, pts);
    }

    /// Adds a pointer flow edge. A new edge immediately carries the objects
    /// already propagated from `src`; objects still in the diff of `src`
    /// follow when `src` is polled. Returns false if the edge existed.
    pub fn add_pfg_edge(&mut self, src: PointerId, dst: PointerId, kind: FlowKind, type_filter: Option<TypeId>) -> bool {
        if !self.pfg.add_edge(src, dst, PFGEdge { kind, type_filter }) {
            return false;
        }
        trace!("New PFG edge {:?} -> {:?} ({:?})", src, dst, kind);
        let filtered = match self.pt_data.get_propa_pts(src) {
            Some(pts) => self.filter_objects(pts, type_filter),
            None => return true,
        };
        if !filtered.is_empty() {
            self.add_points_to(dst, &filtered);
        }
        true
    }

    /// Queues a call edge. It is added to the call graph when polled.
    pub fn add_call_edge(&mut self, edge: CallEdge) {
        self.worklist.add_call_edge(edge);
    }

    /// Makes a context-sensitive method reachable without a caller.
    pub fn add_cs_method(&mut self, method: CSMethodId) {
        self.call_graph.add_node(method);
    }

    /// Makes `entry.method` reachable in the empty context and binds the
    /// objects of its parameter provider.
    pub fn add_entry_point(&mut self, entry: EntryPoint) -> Result<()> {
        let program = self.program.clone();
        let method = entry.method;
        let def = program.method(method);
        let empty = self.selector.empty_context();
        let cs_method = self.csm.get_cs_method(empty, method);
        self.call_graph.add_entry(cs_method);
        info!("Entry point {}", program.method_sig(method));

        let bindings = entry.param_provider.bindings(method, &program, &mut self.heap);
        if !bindings.this.is_empty() {
            let this = def.this.ok_or_else(|| {
                Error::Config(format!("entry point {} has no this variable", program.method_sig(method)))
            })?;
            let pts = self.cs_objs_of(empty, &bindings.this);
            self.add_var_points_to(empty, this, &pts);
        }
        for (index, objs) in &bindings.params {
            let param = *def.params.get(*index).ok_or_else(|| {
                Error::Config(format!("entry point {} has no parameter {}", program.method_sig(method), index))
            })?;
            let pts = self.cs_objs_of(empty, objs);
            self.add_var_points_to(empty, param, &pts);
        }
        for (base, field, obj) in &bindings.fields {
            let base = self.csm.get_cs_obj(empty, *base);
            let obj = self.csm.get_cs_obj(empty, *obj);
            self.add_instance_field_points_to(base, *field, &PointsTo::singleton(obj));
        }
        for (array, elem) in &bindings.arrays {
            let array = self.csm.get_cs_obj(empty, *array);
            let elem = self.csm.get_cs_obj(empty, *elem);
            self.add_array_points_to(array, &PointsTo::singleton(elem));
        }
        for (field, obj) in &bindings.static_fields {
            let obj = self.csm.get_cs_obj(empty, *obj);
            self.add_static_field_points_to(*field, &PointsTo::singleton(obj));
        }
        Ok(())
    }

    /// Initializes `class`: its superclasses first, then its class
    /// initializer becomes reachable in the empty context. Each class is
    /// initialized at most once.
    pub fn initialize_class(&mut self, class: ClassId) {
        if self.initialized_classes.contains(&class) {
            return;
        }
        for c in self.hierarchy.superclasses_top_down(class) {
            if !self.initialized_classes.insert(c) {
                continue;
            }
            if let Some(clinit) = self.program.class(c).clinit {
                debug!("Initializing class {}", self.program.class(c).name);
                let cs_clinit = self.csm.get_cs_method(self.selector.empty_context(), clinit);
                self.add_cs_method(cs_clinit);
            }
        }
    }

    /// Selects the callee context of a call on `recv`.
    pub fn select_instance_context(&mut self, callsite: CSCallSiteId, recv: CSObjId, callee: MethodId) -> ContextId {
        let obj = self.heap.obj(self.csm.cs_obj(recv).obj);
        self.selector
            .select_instance_context(&mut self.csm, callsite, recv, obj, callee)
    }

    /// Stores a result computed by a plugin, replacing any previous one
    /// under the same key.
    pub fn publish_result(&mut self, key: &str, value: Box<dyn Any>) {
        self.named_results.insert(key.to_string(), value);
    }

    /// Consumes the finished solver.
    pub fn into_result(self) -> PointerAnalysisResult {
        PointerAnalysisResult::new(
            self.program,
            self.csm,
            self.heap,
            self.pt_data,
            self.call_graph,
            self.named_results,
            self.selector.description(),
        )
    }

    fn cs_objs_of(&mut self, cid: ContextId, objs: &[ObjId]) -> PointsTo {
        objs.iter().map(|obj| self.csm.get_cs_obj(cid, *obj)).collect()
    }

    /// Keeps the objects whose type is a subtype of `type_filter`.
    fn filter_objects(&self, pts: &PointsTo, type_filter: Option<TypeId>) -> PointsTo {
        match type_filter {
            None => pts.clone(),
            Some(ty) => pts
                .iter()
                .filter(|obj| self.hierarchy.is_subtype(ty, self.cs_obj_type(*obj)))
                .collect(),
        }
    }

    /// Statements of library methods are left out in `only_app` mode.
    fn is_ignored(&self, method: MethodId) -> bool {
        self.options.only_app && !self.program.is_application_method(method)
    }

    /// Runs one plugin hook. The plugin is taken out of the solver for the
    /// duration of the call so it can borrow the solver mutably.
    fn notify<F>(&mut self, hook: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Plugin, &mut Solver) -> anyhow::Result<()>,
    {
        let Some(mut plugin) = self.plugin.take() else {
            return Ok(());
        };
        let res = f(plugin.as_mut(), self);
        self.plugin = Some(plugin);
        res.map_err(|cause| Error::Plugin { hook, cause })
    }

    fn has_pending_work(&self) -> bool {
        let mut rf_iter = self.rf_iter;
        !self.worklist.is_empty() || rf_iter.next().is_some()
    }

    /// Initialize the analysis.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != SolverState::Uninitialized {
            return Err(Error::Config("the solver has already been started".to_string()));
        }
        info!("Context sensitivity: {}", self.selector.description());
        self.state = SolverState::Running;
        self.notify("on_start", |p, s| p.on_start(s))?;
        Ok(())
    }

    /// Drains the work list, then lets plugins add work at the phase
    /// boundary, until neither produces anything new.
    pub fn propagate(&mut self) -> Result<()> {
        loop {
            self.state = SolverState::Running;
            self.solve_worklist()?;
            self.state = SolverState::PhaseBoundary;
            self.notify("on_phase_finish", |p, s| p.on_phase_finish(s))?;
            if !self.has_pending_work() {
                break;
            }
            debug!("Plugins added work, resuming");
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.notify("on_finish", |p, s| p.on_finish(s))?;
        // Work queued by `on_finish` is not processed.
        if !self.worklist.is_empty() {
            warn!("{} work list entries added after the fixpoint were dropped", self.worklist.len());
        }
        self.state = SolverState::Finished;
        info!(
            "Reached {} methods in {} contexts, {} call graph edges, {} pointer flow edges",
            self.reachable_methods.len(),
            self.call_graph.num_funcs(),
            self.call_graph.num_edges(),
            self.pfg.num_edges()
        );
        Ok(())
    }

    fn solve_worklist(&mut self) -> Result<()> {
        loop {
            self.process_reach_funcs()?;
            // Call edges go first so that callees are reachable before
            // the objects bound to their variables are propagated.
            if let Some(edge) = self.worklist.poll_call_edge() {
                self.process_call_edge(edge)?;
            } else if let Some(pointer) = self.worklist.poll_pointer_entry() {
                self.propagate_pointer(pointer)?;
            } else if !self.has_pending_work() {
                return Ok(());
            }
        }
    }

    /// Processes the statements of methods that became reachable in a new
    /// context.
    fn process_reach_funcs(&mut self) -> Result<()> {
        while let Some(method) = self.rf_iter.next() {
            self.process_new_cs_method(method)?;
        }
        Ok(())
    }

    fn process_new_cs_method(&mut self, cs_method: CSMethodId) -> Result<()> {
        let program = self.program.clone();
        let CSMethod { cid, method } = *self.csm.cs_method(cs_method);
        let ignored = self.is_ignored(method);
        let body = &program.method(method).body;

        if self.reachable_methods.insert(method) {
            debug!("New reachable method {}", program.method_sig(method));
            self.notify("on_new_method", |p, s| p.on_new_method(s, method))?;
            if !ignored {
                for index in 0..body.len() {
                    let stmt = StmtId { method, index };
                    self.notify("on_new_stmt", |p, s| p.on_new_stmt(s, stmt, method))?;
                }
            }
        }
        trace!(
            "Processing {}",
            self.csm.cs_method_to_string(cs_method, &program, &self.heap)
        );

        if !ignored {
            for (index, stmt) in body.iter().enumerate() {
                self.process_stmt(cs_method, cid, StmtId { method, index }, stmt)?;
            }
        }
        self.notify("on_new_cs_method", |p, s| p.on_new_cs_method(s, cs_method))
    }

    /// Adds the facts and edges a statement implies in context `cid`.
    /// Loads, stores and calls through a base variable are handled when
    /// the base gains objects.
    fn process_stmt(&mut self, cs_method: CSMethodId, cid: ContextId, stmt_id: StmtId, stmt: &Stmt) -> Result<()> {
        let program = self.program.clone();
        match stmt {
            Stmt::New { lhs, ty } => {
                if !program.is_concerned(*lhs) {
                    return Ok(());
                }
                let obj = self.heap.get_object(stmt_id, *ty);
                let heap_cid = self
                    .selector
                    .select_heap_context(&mut self.csm, cs_method, self.heap.obj(obj));
                let cs_obj = self.csm.get_cs_obj(heap_cid, obj);
                self.add_var_points_to_obj(cid, *lhs, cs_obj);
            }
            Stmt::AssignLiteral { lhs, literal } => match literal {
                Literal::Str(_) | Literal::Class(_) if program.is_concerned(*lhs) => {
                    let obj = self.heap.get_constant_object(literal, program.var(*lhs).ty);
                    let cs_obj = self.csm.get_cs_obj(self.selector.empty_context(), obj);
                    self.add_var_points_to_obj(cid, *lhs, cs_obj);
                }
                _ => {}
            },
            Stmt::Copy { lhs, rhs } => {
                if program.is_concerned(*lhs) {
                    let src = self.csm.get_cs_var(cid, *rhs);
                    let dst = self.csm.get_cs_var(cid, *lhs);
                    self.add_pfg_edge(src, dst, FlowKind::Assign, None);
                }
            }
            Stmt::Cast { lhs, rhs, ty } => {
                if program.is_concerned(*lhs) {
                    let src = self.csm.get_cs_var(cid, *rhs);
                    let dst = self.csm.get_cs_var(cid, *lhs);
                    self.add_pfg_edge(src, dst, FlowKind::Cast, Some(*ty));
                }
            }
            Stmt::LoadField { lhs, base: None, field } => {
                if program.is_concerned(*lhs) {
                    let src = self.csm.get_static_field(*field);
                    let dst = self.csm.get_cs_var(cid, *lhs);
                    self.add_pfg_edge(src, dst, FlowKind::StaticLoad, None);
                }
            }
            Stmt::StoreField { base: None, field, rhs } => {
                if program.is_concerned(*rhs) {
                    let src = self.csm.get_cs_var(cid, *rhs);
                    let dst = self.csm.get_static_field(*field);
                    self.add_pfg_edge(src, dst, FlowKind::StaticStore, None);
                }
            }
            Stmt::Invoke { call_site } => {
                let def = program.call_site(*call_site);
                match def.kind {
                    CallKind::Static => match self.hierarchy.resolve_method(&def.method_ref) {
                        Some(callee) => {
                            let cs_call_site = self.csm.get_cs_call_site(cid, *call_site);
                            let callee_cid = self
                                .selector
                                .select_static_context(&mut self.csm, cs_call_site, callee);
                            let cs_callee = self.csm.get_cs_method(callee_cid, callee);
                            self.worklist
                                .add_call_edge(CallEdge::new(CallKind::Static, cs_call_site, cs_callee));
                        }
                        None => {
                            return Err(Error::MalformedIr(format!(
                                "unresolved static call {}",
                                program.call_site_sig(*call_site)
                            )))
                        }
                    },
                    CallKind::Dynamic => {
                        warn!("Dynamic call {} is left to plugins", program.call_site_sig(*call_site));
                        let cs_call_site = self.csm.get_cs_call_site(cid, *call_site);
                        self.notify("on_dynamic_call", |p, s| p.on_dynamic_call(s, cs_call_site))?;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Propagates the diff of `pointer` to its successors.
    fn propagate_pointer(&mut self, pointer: PointerId) -> Result<()> {
        let Some(diff) = self.pt_data.take_diff(pointer) else {
            return Ok(());
        };
        trace!("Propagating {} objects from {:?}", diff.count(), pointer);
        for (target, edge) in self.pfg.out_edges(pointer) {
            let filtered = self.filter_objects(&diff, edge.type_filter);
            if !filtered.is_empty() {
                self.add_points_to(target, &filtered);
            }
        }

        if let Pointer::Var { cid, var } = *self.csm.pointer(pointer) {
            if !self.is_ignored(self.program.var(var).method) {
                for obj in diff.iter() {
                    self.process_field_accesses(cid, var, obj);
                }
                self.process_call(cid, var, &diff)?;
            }
            self.notify("on_new_points_to_set", |p, s| p.on_new_points_to_set(s, pointer, &diff))?;
        }
        Ok(())
    }

    /// Adds the load and store edges through `obj`, a new object of base
    /// variable `var`.
    fn process_field_accesses(&mut self, cid: ContextId, var: VarId, obj: CSObjId) {
        // Accesses through null fail at run time.
        if self.is_null_object(obj) {
            return;
        }
        let program = self.program.clone();
        let uses = program.var_uses(var);
        for (field, rhs) in &uses.store_fields {
            if program.is_concerned(*rhs) {
                let src = self.csm.get_cs_var(cid, *rhs);
                let dst = self.csm.get_instance_field(obj, *field);
                self.add_pfg_edge(src, dst, FlowKind::InstanceStore, None);
            }
        }
        for (lhs, field) in &uses.load_fields {
            if program.is_concerned(*lhs) {
                let src = self.csm.get_instance_field(obj, *field);
                let dst = self.csm.get_cs_var(cid, *lhs);
                self.add_pfg_edge(src, dst, FlowKind::InstanceLoad, None);
            }
        }
        // Only array objects have an index slot.
        let Some(elem_type) = program.element_type(self.cs_obj_type(obj)) else {
            return;
        };
        for rhs in &uses.store_arrays {
            if program.is_concerned(*rhs) {
                let src = self.csm.get_cs_var(cid, *rhs);
                let dst = self.csm.get_array_index(obj);
                self.add_pfg_edge(src, dst, FlowKind::ArrayStore, Some(elem_type));
            }
        }
        for lhs in &uses.load_arrays {
            if program.is_concerned(*lhs) {
                let src = self.csm.get_array_index(obj);
                let dst = self.csm.get_cs_var(cid, *lhs);
                self.add_pfg_edge(src, dst, FlowKind::ArrayLoad, None);
            }
        }
    }

    /// Resolves the instance calls on `var` for its new receiver objects.
    fn process_call(&mut self, cid: ContextId, var: VarId, recv_objs: &PointsTo) -> Result<()> {
        let program = self.program.clone();
        for call_site in &program.var_uses(var).invokes {
            let def = program.call_site(*call_site);
            if !def.kind.has_receiver() {
                continue;
            }
            for recv in recv_objs.iter() {
                if self.is_null_object(recv) {
                    continue;
                }
                let recv_type = self.cs_obj_type(recv);
                let callee = if def.kind.is_dispatched() {
                    self.hierarchy.resolve_virtual_dispatch(recv_type, &def.method_ref)
                } else {
                    self.hierarchy.resolve_method(&def.method_ref)
                };
                let Some(callee) = callee else {
                    warn!(
                        "Unresolved call {} on {}",
                        program.call_site_sig(*call_site),
                        self.csm.cs_obj_to_string(recv, &program, &self.heap)
                    );
                    self.notify("on_unresolved_call", |p, s| p.on_unresolved_call(s, recv, cid, *call_site))?;
                    continue;
                };
                let cs_call_site = self.csm.get_cs_call_site(cid, *call_site);
                let callee_cid = self.select_instance_context(cs_call_site, recv, callee);
                let cs_callee = self.csm.get_cs_method(callee_cid, callee);
                self.worklist.add_call_edge(CallEdge::new(def.kind, cs_call_site, cs_callee));
                if let Some(this) = program.method(callee).this {
                    self.add_var_points_to_obj(callee_cid, this, recv);
                }
            }
        }
        Ok(())
    }

    /// Adds a polled call edge to the call graph. A new edge makes the
    /// callee reachable and binds arguments and results.
    fn process_call_edge(&mut self, edge: CallEdge) -> Result<()> {
        let program = self.program.clone();
        let cs_call_site = *self.csm.cs_call_site(edge.callsite);
        let def = program.call_site(cs_call_site.call_site);
        let caller = self.csm.get_cs_method(cs_call_site.cid, def.container);
        if !self.call_graph.add_edge(edge.callsite, caller, edge.callee, edge.kind) {
            return Ok(());
        }
        debug!(
            "New call edge {} -> {}",
            self.csm.cs_call_site_to_string(edge.callsite, &program, &self.heap),
            self.csm.cs_method_to_string(edge.callee, &program, &self.heap)
        );
        self.process_reach_funcs()?;

        if edge.kind != CallKind::Other {
            let callee = *self.csm.cs_method(edge.callee);
            let callee_def = program.method(callee.method);
            for (arg, param) in def.args.iter().zip(callee_def.params.iter()) {
                if program.is_concerned(*param) {
                    let src = self.csm.get_cs_var(cs_call_site.cid, *arg);
                    let dst = self.csm.get_cs_var(callee.cid, *param);
                    self.add_pfg_edge(src, dst, FlowKind::CallParam, None);
                }
            }
            if let Some(result) = def.result {
                if program.is_concerned(result) {
                    let dst = self.csm.get_cs_var(cs_call_site.cid, result);
                    for ret in program.ret_vars(callee.method) {
                        let src = self.csm.get_cs_var(callee.cid, *ret);
                        self.add_pfg_edge(src, dst, FlowKind::CallReturn, None);
                    }
                }
            }
        }
        self.notify("on_new_call_edge", |p, s| p.on_new_call_edge(s, &edge))
    }
}

impl PointerAnalysis for Solver {
    fn analyze(&mut self) -> Result<()> {
        let now = Instant::now();

        // Initialization for the analysis.
        self.initialize()?;

        // Solve the worklist problem.
        self.propagate()?;

        let elapsed = now.elapsed();
        info!("Context-sensitive PTA completed.");
        info!("Analysis time: {}", humantime::format_duration(elapsed).to_string());

        // Finalize the analysis.
        self.finalize()
    }
}
