// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Interning of context-sensitive elements. Each `(context, entity)` key is
//! mapped to one dense id for the lifetime of an analysis run.

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use itertools::Itertools;

use super::context_selector::CtxElem;
use super::heap_model::{HeapModel, ObjId};
use crate::ir::context::{Context, ContextCache, ContextId};
use crate::ir::program::{CallSiteId, FieldId, MethodId, Program, VarId};
use crate::util::bit_vec::Idx;

crate::index_type! {
    pub struct PointerId;
}
crate::index_type! {
    pub struct CSObjId;
}
crate::index_type! {
    pub struct CSMethodId;
}
crate::index_type! {
    pub struct CSCallSiteId;
}

/// A pointer owning a points-to set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pointer {
    /// A variable under a context.
    Var { cid: ContextId, var: VarId },
    /// A field of a context-sensitive object.
    InstanceField { obj: CSObjId, field: FieldId },
    /// Static fields carry no context.
    StaticField { field: FieldId },
    /// All slots of an array object.
    ArrayIndex { obj: CSObjId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSObj {
    pub cid: ContextId,
    pub obj: ObjId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSMethod {
    pub cid: ContextId,
    pub method: MethodId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSCallSite {
    pub cid: ContextId,
    pub call_site: CallSiteId,
}

/// The pointer categories reported in dumps, in dump order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerCategory {
    Var,
    StaticField,
    InstanceField,
    ArrayIndex,
}

impl PointerCategory {
    pub const ALL: [PointerCategory; 4] = [
        PointerCategory::Var,
        PointerCategory::StaticField,
        PointerCategory::InstanceField,
        PointerCategory::ArrayIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PointerCategory::Var => "variables",
            PointerCategory::StaticField => "static fields",
            PointerCategory::InstanceField => "instance fields",
            PointerCategory::ArrayIndex => "array indexes",
        }
    }
}

impl Pointer {
    pub fn category(&self) -> PointerCategory {
        match self {
            Pointer::Var { .. } => PointerCategory::Var,
            Pointer::InstanceField { .. } => PointerCategory::InstanceField,
            Pointer::StaticField { .. } => PointerCategory::StaticField,
            Pointer::ArrayIndex { .. } => PointerCategory::ArrayIndex,
        }
    }
}

/// One growable table per element kind plus the reverse lookup map.
struct Interner<K, I> {
    elems: Vec<K>,
    ids: HashMap<K, I>,
}

impl<K: Copy + Eq + Hash, I: Idx> Interner<K, I> {
    fn new() -> Self {
        Interner {
            elems: Vec::new(),
            ids: HashMap::new(),
        }
    }

    /// Returns the id of `key` and whether it was created by this call.
    fn intern(&mut self, key: K) -> (I, bool) {
        if let Some(id) = self.ids.get(&key) {
            return (*id, false);
        }
        let id = I::new(self.elems.len());
        self.elems.push(key);
        self.ids.insert(key, id);
        (id, true)
    }

    fn get(&self, key: &K) -> Option<I> {
        self.ids.get(key).copied()
    }

    fn elem(&self, id: I) -> &K {
        &self.elems[id.index()]
    }

    fn iter(&self) -> impl Iterator<Item = (I, &K)> {
        self.elems.iter().enumerate().map(|(i, k)| (I::new(i), k))
    }
}

pub struct CSManager {
    ctx_cache: ContextCache<CtxElem>,
    pointers: Interner<Pointer, PointerId>,
    cs_objs: Interner<CSObj, CSObjId>,
    cs_methods: Interner<CSMethod, CSMethodId>,
    cs_call_sites: Interner<CSCallSite, CSCallSiteId>,
    /// Pointers of each category, in creation order.
    by_category: HashMap<PointerCategory, Vec<PointerId>>,
    /// Instance field and array index pointers rooted at an object.
    obj_fields: HashMap<CSObjId, Vec<PointerId>>,
    /// The context-sensitive pointers of each variable.
    var_pointers: HashMap<VarId, Vec<PointerId>>,
}

impl Default for CSManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CSManager {
    pub fn new() -> Self {
        CSManager {
            ctx_cache: ContextCache::new(),
            pointers: Interner::new(),
            cs_objs: Interner::new(),
            cs_methods: Interner::new(),
            cs_call_sites: Interner::new(),
            by_category: HashMap::new(),
            obj_fields: HashMap::new(),
            var_pointers: HashMap::new(),
        }
    }

    fn get_pointer(&mut self, pointer: Pointer) -> PointerId {
        let (id, new) = self.pointers.intern(pointer);
        if new {
            self.by_category.entry(pointer.category()).or_default().push(id);
            match pointer {
                Pointer::Var { var, .. } => self.var_pointers.entry(var).or_default().push(id),
                Pointer::InstanceField { obj, .. } | Pointer::ArrayIndex { obj } => {
                    self.obj_fields.entry(obj).or_default().push(id)
                }
                Pointer::StaticField { .. } => {}
            }
        }
        id
    }

    pub fn get_cs_var(&mut self, cid: ContextId, var: VarId) -> PointerId {
        self.get_pointer(Pointer::Var { cid, var })
    }

    pub fn get_instance_field(&mut self, obj: CSObjId, field: FieldId) -> PointerId {
        self.get_pointer(Pointer::InstanceField { obj, field })
    }

    pub fn get_static_field(&mut self, field: FieldId) -> PointerId {
        self.get_pointer(Pointer::StaticField { field })
    }

    pub fn get_array_index(&mut self, obj: CSObjId) -> PointerId {
        self.get_pointer(Pointer::ArrayIndex { obj })
    }

    pub fn get_cs_obj(&mut self, cid: ContextId, obj: ObjId) -> CSObjId {
        self.cs_objs.intern(CSObj { cid, obj }).0
    }

    pub fn get_cs_method(&mut self, cid: ContextId, method: MethodId) -> CSMethodId {
        self.cs_methods.intern(CSMethod { cid, method }).0
    }

    pub fn get_cs_call_site(&mut self, cid: ContextId, call_site: CallSiteId) -> CSCallSiteId {
        self.cs_call_sites.intern(CSCallSite { cid, call_site }).0
    }

    /// Looks up an existing pointer without creating it.
    pub fn find_pointer(&self, pointer: &Pointer) -> Option<PointerId> {
        self.pointers.get(pointer)
    }

    pub fn find_cs_method(&self, cid: ContextId, method: MethodId) -> Option<CSMethodId> {
        self.cs_methods.get(&CSMethod { cid, method })
    }

    #[inline]
    pub fn pointer(&self, id: PointerId) -> &Pointer {
        self.pointers.elem(id)
    }

    #[inline]
    pub fn cs_obj(&self, id: CSObjId) -> &CSObj {
        self.cs_objs.elem(id)
    }

    #[inline]
    pub fn cs_method(&self, id: CSMethodId) -> &CSMethod {
        self.cs_methods.elem(id)
    }

    #[inline]
    pub fn cs_call_site(&self, id: CSCallSiteId) -> &CSCallSite {
        self.cs_call_sites.elem(id)
    }

    pub fn get_context_id(&mut self, context: &Rc<Context<CtxElem>>) -> ContextId {
        self.ctx_cache.get_context_id(context)
    }

    pub fn get_context(&self, cid: ContextId) -> Rc<Context<CtxElem>> {
        self.ctx_cache.get_context(cid).unwrap_or_else(Context::new_empty)
    }

    pub fn num_contexts(&self) -> usize {
        self.ctx_cache.len()
    }

    /// All pointers of a category, in creation order.
    pub fn pointers_of(&self, category: PointerCategory) -> &[PointerId] {
        self.by_category.get(&category).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn cs_vars(&self) -> &[PointerId] {
        self.pointers_of(PointerCategory::Var)
    }

    pub fn instance_fields(&self) -> &[PointerId] {
        self.pointers_of(PointerCategory::InstanceField)
    }

    pub fn static_fields(&self) -> &[PointerId] {
        self.pointers_of(PointerCategory::StaticField)
    }

    pub fn array_indexes(&self) -> &[PointerId] {
        self.pointers_of(PointerCategory::ArrayIndex)
    }

    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, &Pointer)> {
        self.pointers.iter()
    }

    pub fn cs_objs(&self) -> impl Iterator<Item = (CSObjId, &CSObj)> {
        self.cs_objs.iter()
    }

    pub fn cs_methods(&self) -> impl Iterator<Item = (CSMethodId, &CSMethod)> {
        self.cs_methods.iter()
    }

    pub fn cs_call_sites(&self) -> impl Iterator<Item = (CSCallSiteId, &CSCallSite)> {
        self.cs_call_sites.iter()
    }

    /// The instance field and array index pointers of `obj`.
    pub fn fields_of(&self, obj: CSObjId) -> &[PointerId] {
        self.obj_fields.get(&obj).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The pointers of `var` under every context seen so far.
    pub fn cs_vars_of(&self, var: VarId) -> &[PointerId] {
        self.var_pointers.get(&var).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn context_to_string(&self, cid: ContextId, program: &Program, heap: &HeapModel) -> String {
        let ctx = self.get_context(cid);
        let elems = ctx.elems().iter().map(|elem| match elem {
            CtxElem::CallSite(cs) => program.call_site_sig(*cs),
            CtxElem::Object(obj) => heap.obj_to_string(*obj),
            CtxElem::Type(ty) => program.ty(*ty).name.clone(),
        });
        format!("[{}]", elems.format(", "))
    }

    pub fn cs_obj_to_string(&self, id: CSObjId, program: &Program, heap: &HeapModel) -> String {
        let cs_obj = self.cs_obj(id);
        format!(
            "{}:{}",
            self.context_to_string(cs_obj.cid, program, heap),
            heap.obj_to_string(cs_obj.obj)
        )
    }

    pub fn cs_method_to_string(&self, id: CSMethodId, program: &Program, heap: &HeapModel) -> String {
        let csm = self.cs_method(id);
        format!(
            "{}:{}",
            self.context_to_string(csm.cid, program, heap),
            program.method_sig(csm.method)
        )
    }

    pub fn cs_call_site_to_string(&self, id: CSCallSiteId, program: &Program, heap: &HeapModel) -> String {
        let cs = self.cs_call_site(id);
        format!(
            "{}:{}",
            self.context_to_string(cs.cid, program, heap),
            program.call_site_sig(cs.call_site)
        )
    }

    pub fn pointer_to_string(&self, id: PointerId, program: &Program, heap: &HeapModel) -> String {
        match *self.pointer(id) {
            Pointer::Var { cid, var } => {
                format!("{}:{}", self.context_to_string(cid, program, heap), program.var_sig(var))
            }
            Pointer::InstanceField { obj, field } => {
                format!("{}.{}", self.cs_obj_to_string(obj, program, heap), program.field(field).name)
            }
            Pointer::StaticField { field } => program.field_sig(field),
            Pointer::ArrayIndex { obj } => format!("{}[*]", self.cs_obj_to_string(obj, program, heap)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut csm = CSManager::new();
        let (v1, v2) = (VarId::new(1), VarId::new(2));
        let ctx = csm.get_context_id(&Context::new(vec![CtxElem::CallSite(CallSiteId::new(0))]));
        assert_ne!(ctx, ContextId::EMPTY);

        let p1 = csm.get_cs_var(ContextId::EMPTY, v1);
        assert_eq!(p1, csm.get_cs_var(ContextId::EMPTY, v1));
        let p2 = csm.get_cs_var(ctx, v1);
        let p3 = csm.get_cs_var(ContextId::EMPTY, v2);
        assert_ne!(p1, p2);
        assert_ne!(p1, p3);
        assert_eq!(csm.cs_vars_of(v1), &[p1, p2]);

        let o = csm.get_cs_obj(ctx, ObjId::new(0));
        assert_eq!(o, csm.get_cs_obj(ctx, ObjId::new(0)));
        assert_ne!(o, csm.get_cs_obj(ContextId::EMPTY, ObjId::new(0)));
        let f = csm.get_instance_field(o, FieldId::new(0));
        let a = csm.get_array_index(o);
        assert_eq!(f, csm.get_instance_field(o, FieldId::new(0)));
        assert_eq!(csm.fields_of(o), &[f, a]);
        let s = csm.get_static_field(FieldId::new(0));
        assert_eq!(s, csm.get_static_field(FieldId::new(0)));

        assert_eq!(csm.cs_vars().len(), 3);
        assert_eq!(csm.instance_fields(), &[f]);
        assert_eq!(csm.static_fields(), &[s]);
        assert_eq!(csm.array_indexes(), &[a]);
        assert_eq!(csm.find_pointer(&Pointer::ArrayIndex { obj: o }), Some(a));

        let m = csm.get_cs_method(ctx, MethodId::new(3));
        assert_eq!(m, csm.get_cs_method(ctx, MethodId::new(3)));
        assert_eq!(csm.find_cs_method(ContextId::EMPTY, MethodId::new(3)), None);
        let cs = csm.get_cs_call_site(ctx, CallSiteId::new(0));
        assert_eq!(csm.cs_call_site(cs).call_site, CallSiteId::new(0));
    }
}
