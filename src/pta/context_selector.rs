// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Context selection strategies.
use std::rc::Rc;

use super::cs_manager::{CSCallSiteId, CSManager, CSMethodId, CSObjId};
use super::heap_model::{Obj, ObjId};
use crate::error::{Error, Result};
use crate::ir::context::{Context, ContextElement, ContextId};
use crate::ir::program::{CallSiteId, MethodId, Program, TypeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CtxElem {
    CallSite(CallSiteId),
    Object(ObjId),
    Type(TypeId),
}

impl ContextElement for CtxElem {}

pub trait ContextSelector {
    fn empty_context(&self) -> ContextId {
        ContextId::EMPTY
    }

    /// Context of the callee of a call without receiver object.
    fn select_static_context(&self, csm: &mut CSManager, callsite: CSCallSiteId, callee: MethodId) -> ContextId;

    /// Context of the callee of a call on `recv`.
    fn select_instance_context(
        &self,
        csm: &mut CSManager,
        callsite: CSCallSiteId,
        recv: CSObjId,
        recv_obj: &Obj,
        callee: MethodId,
    ) -> ContextId;

    /// Context of an object allocated by `method`.
    fn select_heap_context(&self, csm: &mut CSManager, method: CSMethodId, obj: &Obj) -> ContextId;

    fn description(&self) -> String;
}

/// Pushes `elem` in front of context `base`, keeping at most `k` elements.
fn extend(csm: &mut CSManager, base: ContextId, elem: CtxElem, k: usize) -> ContextId {
    let base_ctx = csm.get_context(base);
    let ctx = Context::new_k_limited_context(&base_ctx, elem, k);
    csm.get_context_id(&ctx)
}

/// Keeps the `k` most recent elements of context `cid`.
fn truncate(csm: &mut CSManager, cid: ContextId, k: usize) -> ContextId {
    let ctx = csm.get_context(cid);
    if ctx.len() <= k {
        return cid;
    }
    let ctx = Context::k_limited_context(&ctx, k);
    csm.get_context_id(&ctx)
}

pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    fn select_static_context(&self, _csm: &mut CSManager, _callsite: CSCallSiteId, _callee: MethodId) -> ContextId {
        ContextId::EMPTY
    }

    fn select_instance_context(
        &self,
        _csm: &mut CSManager,
        _callsite: CSCallSiteId,
        _recv: CSObjId,
        _recv_obj: &Obj,
        _callee: MethodId,
    ) -> ContextId {
        ContextId::EMPTY
    }

    fn select_heap_context(&self, _csm: &mut CSManager, _method: CSMethodId, _obj: &Obj) -> ContextId {
        ContextId::EMPTY
    }

    fn description(&self) -> String {
        "ci".to_string()
    }
}

pub struct KCallSiteSensitive {
    /// Context length limit for methods
    k: usize,
    /// Context length limit for heap objects
    hk: usize,
}

impl KCallSiteSensitive {
    pub fn new(k: usize) -> Self {
        Self { k, hk: k - 1 }
    }

    fn new_context(&self, csm: &mut CSManager, callsite: CSCallSiteId) -> ContextId {
        let cs = *csm.cs_call_site(callsite);
        extend(csm, cs.cid, CtxElem::CallSite(cs.call_site), self.k)
    }
}

impl ContextSelector for KCallSiteSensitive {
    fn select_static_context(&self, csm: &mut CSManager, callsite: CSCallSiteId, _callee: MethodId) -> ContextId {
        self.new_context(csm, callsite)
    }

    fn select_instance_context(
        &self,
        csm: &mut CSManager,
        callsite: CSCallSiteId,
        _recv: CSObjId,
        _recv_obj: &Obj,
        _callee: MethodId,
    ) -> ContextId {
        self.new_context(csm, callsite)
    }

    fn select_heap_context(&self, csm: &mut CSManager, method: CSMethodId, _obj: &Obj) -> ContextId {
        let cid = csm.cs_method(method).cid;
        truncate(csm, cid, self.hk)
    }

    fn description(&self) -> String {
        format!("{}-call", self.k)
    }
}

pub struct KObjectSensitive {
    /// Context length limit for methods
    k: usize,
    /// Context length limit for heap objects
    hk: usize,
}

impl KObjectSensitive {
    pub fn new(k: usize) -> Self {
        Self { k, hk: k - 1 }
    }
}

impl ContextSelector for KObjectSensitive {
    /// Static calls inherit the caller's context.
    fn select_static_context(&self, csm: &mut CSManager, callsite: CSCallSiteId, _callee: MethodId) -> ContextId {
        csm.cs_call_site(callsite).cid
    }

    fn select_instance_context(
        &self,
        csm: &mut CSManager,
        _callsite: CSCallSiteId,
        recv: CSObjId,
        _recv_obj: &Obj,
        _callee: MethodId,
    ) -> ContextId {
        let recv = *csm.cs_obj(recv);
        extend(csm, recv.cid, CtxElem::Object(recv.obj), self.k)
    }

    fn select_heap_context(&self, csm: &mut CSManager, method: CSMethodId, _obj: &Obj) -> ContextId {
        let cid = csm.cs_method(method).cid;
        truncate(csm, cid, self.hk)
    }

    fn description(&self) -> String {
        format!("{}-obj", self.k)
    }
}

pub struct KTypeSensitive {
    /// Context length limit for methods
    k: usize,
    /// Context length limit for heap objects
    hk: usize,
    program: Rc<Program>,
}

impl KTypeSensitive {
    pub fn new(k: usize, program: Rc<Program>) -> Self {
        Self { k, hk: k - 1, program }
    }
}

impl ContextSelector for KTypeSensitive {
    fn select_static_context(&self, csm: &mut CSManager, callsite: CSCallSiteId, _callee: MethodId) -> ContextId {
        csm.cs_call_site(callsite).cid
    }

    fn select_instance_context(
        &self,
        csm: &mut CSManager,
        _callsite: CSCallSiteId,
        recv: CSObjId,
        recv_obj: &Obj,
        _callee: MethodId,
    ) -> ContextId {
        let base = csm.cs_obj(recv).cid;
        let elem = CtxElem::Type(recv_obj.container_type(&self.program));
        extend(csm, base, elem, self.k)
    }

    fn select_heap_context(&self, csm: &mut CSManager, method: CSMethodId, _obj: &Obj) -> ContextId {
        let cid = csm.cs_method(method).cid;
        truncate(csm, cid, self.hk)
    }

    fn description(&self) -> String {
        format!("{}-type", self.k)
    }
}

/// Builds a selector from its description: `ci`, `<k>-call`, `<k>-obj`
/// or `<k>-type`.
pub fn build_context_selector(desc: &str, program: Rc<Program>) -> Result<Box<dyn ContextSelector>> {
    if desc == "ci" {
        return Ok(Box::new(ContextInsensitive));
    }
    let invalid = || Error::Config(format!("invalid context sensitivity '{}'", desc));
    let (k, kind) = desc.split_once('-').ok_or_else(invalid)?;
    let k: usize = k.parse().map_err(|_| invalid())?;
    if k == 0 {
        return Err(Error::Config(format!(
            "context depth of '{}' must be positive, use 'ci' for context insensitivity",
            desc
        )));
    }
    match kind {
        "call" => Ok(Box::new(KCallSiteSensitive::new(k))),
        "obj" => Ok(Box::new(KObjectSensitive::new(k))),
        "type" => Ok(Box::new(KTypeSensitive::new(k, program))),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::builder::ProgramBuilder;
    use crate::ir::program::StmtId;
    use crate::pta::heap_model::ObjKind;
    use crate::util::bit_vec::Idx;

    fn program() -> Rc<Program> {
        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        pb.method(a, "m", &[], true);
        Rc::new(pb.build().unwrap())
    }

    fn new_obj(method: usize) -> Obj {
        Obj {
            kind: ObjKind::New {
                alloc: StmtId {
                    method: MethodId::new(method),
                    index: 0,
                },
            },
            ty: TypeId::new(0),
            container: Some(MethodId::new(method)),
        }
    }

    #[test]
    fn parse_selector_descriptions() {
        let program = program();
        assert_eq!(build_context_selector("ci", program.clone()).unwrap().description(), "ci");
        assert_eq!(build_context_selector("2-call", program.clone()).unwrap().description(), "2-call");
        assert_eq!(build_context_selector("1-obj", program.clone()).unwrap().description(), "1-obj");
        assert_eq!(build_context_selector("3-type", program.clone()).unwrap().description(), "3-type");
        for bad in ["0-call", "x-obj", "2-foo", "call", ""] {
            assert!(matches!(build_context_selector(bad, program.clone()), Err(Error::Config(_))));
        }
    }

    #[test]
    fn call_site_contexts_are_k_limited() {
        let mut csm = CSManager::new();
        let selector = KCallSiteSensitive::new(2);
        let m = MethodId::new(0);
        let cs0 = csm.get_cs_call_site(ContextId::EMPTY, CallSiteId::new(0));
        let c1 = selector.select_static_context(&mut csm, cs0, m);
        let cs1 = csm.get_cs_call_site(c1, CallSiteId::new(1));
        let c2 = selector.select_static_context(&mut csm, cs1, m);
        let cs2 = csm.get_cs_call_site(c2, CallSiteId::new(2));
        let c3 = selector.select_static_context(&mut csm, cs2, m);
        assert_eq!(
            csm.get_context(c3).elems(),
            &[CtxElem::CallSite(CallSiteId::new(2)), CtxElem::CallSite(CallSiteId::new(1))]
        );
        // Same call string, same context.
        assert_eq!(c1, selector.select_static_context(&mut csm, cs0, m));

        let csm_method = csm.get_cs_method(c3, m);
        let heap_ctx = selector.select_heap_context(&mut csm, csm_method, &new_obj(0));
        assert_eq!(csm.get_context(heap_ctx).elems(), &[CtxElem::CallSite(CallSiteId::new(2))]);
    }

    #[test]
    fn object_contexts_use_receiver() {
        let mut csm = CSManager::new();
        let selector = KObjectSensitive::new(1);
        let m = MethodId::new(0);
        let cs = csm.get_cs_call_site(ContextId::EMPTY, CallSiteId::new(0));
        let recv = csm.get_cs_obj(ContextId::EMPTY, ObjId::new(7));
        let obj = new_obj(0);
        let ctx = selector.select_instance_context(&mut csm, cs, recv, &obj, m);
        assert_eq!(csm.get_context(ctx).elems(), &[CtxElem::Object(ObjId::new(7))]);
        assert_eq!(selector.select_static_context(&mut csm, cs, m), ContextId::EMPTY);
        let csm_method = csm.get_cs_method(ctx, m);
        assert_eq!(selector.select_heap_context(&mut csm, csm_method, &obj), ContextId::EMPTY);
    }

    #[test]
    fn type_contexts_use_container_class() {
        let program = program();
        let mut csm = CSManager::new();
        let selector = KTypeSensitive::new(1, program.clone());
        let cs = csm.get_cs_call_site(ContextId::EMPTY, CallSiteId::new(0));
        let recv = csm.get_cs_obj(ContextId::EMPTY, ObjId::new(0));
        let ctx = selector.select_instance_context(&mut csm, cs, recv, &new_obj(0), MethodId::new(0));
        let a_ty = program.class(program.method(MethodId::new(0)).class).ty;
        assert_eq!(csm.get_context(ctx).elems(), &[CtxElem::Type(a_ty)]);
    }
}
