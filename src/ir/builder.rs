// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Programmatic construction of programs, used by tests and by tools that
//! translate other front ends.

use std::collections::HashMap;

use itertools::Itertools;

use super::call_site::{CallKind, CallSiteDef, MethodRef};
use super::program::*;
use crate::error::Result;
use crate::util::bit_vec::Idx;

/// Per-method construction state.
#[derive(Default)]
struct MethodState {
    /// Counter for `%tmp<n>` temporaries of this method.
    next_temp: usize,
}

#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
    method_states: Vec<MethodState>,
    array_types: HashMap<TypeId, TypeId>,
    named_types: HashMap<String, TypeId>,
    null_type: Option<TypeId>,
}

impl ProgramBuilder {
    pub fn new() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    fn add_type(&mut self, name: String, kind: TypeKind) -> TypeId {
        let id = TypeId::new(self.program.types.len());
        self.program.types.push(TypeDef { name, kind });
        id
    }

    fn add_class(&mut self, name: &str, super_class: Option<ClassId>, is_interface: bool) -> ClassId {
        let id = ClassId::new(self.program.classes.len());
        let ty = self.add_type(name.to_string(), TypeKind::Class(id));
        self.named_types.insert(name.to_string(), ty);
        self.program.classes.push(ClassDef {
            name: name.to_string(),
            ty,
            super_class,
            interfaces: Vec::new(),
            is_interface,
            is_application: true,
            methods: Vec::new(),
            fields: Vec::new(),
            clinit: None,
        });
        id
    }

    /// Adds a class. The first class added without a superclass becomes
    /// the root object class unless one is set explicitly.
    pub fn class(&mut self, name: &str, super_class: Option<ClassId>) -> ClassId {
        let id = self.add_class(name, super_class, false);
        if super_class.is_none() && self.program.object_class.is_none() {
            self.program.object_class = Some(id);
        }
        id
    }

    pub fn interface(&mut self, name: &str, super_interfaces: &[ClassId]) -> ClassId {
        let id = self.add_class(name, None, true);
        self.program.classes[id.index()].interfaces.extend_from_slice(super_interfaces);
        id
    }

    pub fn implements(&mut self, class: ClassId, interface: ClassId) {
        self.program.classes[class.index()].interfaces.push(interface);
    }

    /// Marks a class as library code.
    pub fn set_library(&mut self, class: ClassId) {
        self.program.classes[class.index()].is_application = false;
    }

    pub fn set_object_class(&mut self, class: ClassId) {
        self.program.object_class = Some(class);
    }

    /// Makes every array type a subtype of `interface`.
    pub fn add_array_interface(&mut self, interface: ClassId) {
        self.program.array_interfaces.push(interface);
    }

    pub fn class_type(&self, class: ClassId) -> TypeId {
        self.program.classes[class.index()].ty
    }

    pub fn array_type(&mut self, elem: TypeId) -> TypeId {
        if let Some(ty) = self.array_types.get(&elem) {
            return *ty;
        }
        let name = format!("{}[]", self.program.types[elem.index()].name);
        let ty = self.add_type(name, TypeKind::Array(elem));
        self.array_types.insert(elem, ty);
        ty
    }

    pub fn null_type(&mut self) -> TypeId {
        if let Some(ty) = self.null_type {
            return ty;
        }
        let ty = self.add_type("null".to_string(), TypeKind::Null);
        self.null_type = Some(ty);
        ty
    }

    pub fn primitive_type(&mut self, name: &str) -> TypeId {
        if let Some(ty) = self.named_types.get(name) {
            return *ty;
        }
        let ty = self.add_type(name.to_string(), TypeKind::Primitive);
        self.named_types.insert(name.to_string(), ty);
        ty
    }

    pub fn field(&mut self, class: ClassId, name: &str, ty: TypeId, is_static: bool) -> FieldId {
        let id = FieldId::new(self.program.fields.len());
        self.program.fields.push(FieldDef {
            name: name.to_string(),
            class,
            ty,
            is_static,
        });
        self.program.classes[class.index()].fields.push(id);
        id
    }

    /// Adds a method with one parameter variable per entry of `params`
    /// and, for instance methods, a `this` variable.
    pub fn method(&mut self, class: ClassId, name: &str, params: &[TypeId], is_static: bool) -> MethodId {
        let id = MethodId::new(self.program.methods.len());
        let subsignature = format!(
            "{}({})",
            name,
            params.iter().map(|p| self.program.types[p.index()].name.as_str()).join(",")
        );
        self.program.methods.push(MethodDef {
            name: name.to_string(),
            subsignature,
            class,
            is_static,
            is_abstract: false,
            this: None,
            params: Vec::new(),
            body: Vec::new(),
            handlers: Vec::new(),
        });
        self.method_states.push(MethodState::default());
        self.program.classes[class.index()].methods.push(id);
        if !is_static {
            let class_ty = self.class_type(class);
            let this = self.var(id, "this", class_ty);
            self.program.methods[id.index()].this = Some(this);
        }
        for (i, ty) in params.iter().enumerate() {
            let param = self.var(id, &format!("p{}", i), *ty);
            self.program.methods[id.index()].params.push(param);
        }
        id
    }

    pub fn set_abstract(&mut self, method: MethodId) {
        self.program.methods[method.index()].is_abstract = true;
    }

    /// Adds the class initializer of `class`.
    pub fn clinit(&mut self, class: ClassId) -> MethodId {
        let id = self.method(class, "<clinit>", &[], true);
        self.program.classes[class.index()].clinit = Some(id);
        id
    }

    pub fn this_var(&self, method: MethodId) -> Option<VarId> {
        self.program.methods[method.index()].this
    }

    pub fn param(&self, method: MethodId, index: usize) -> VarId {
        self.program.methods[method.index()].params[index]
    }

    pub fn var(&mut self, method: MethodId, name: &str, ty: TypeId) -> VarId {
        let id = VarId::new(self.program.vars.len());
        self.program.vars.push(VarDef {
            name: name.to_string(),
            method,
            ty,
        });
        id
    }

    /// Adds a fresh temporary `%tmp<n>`, numbered per method.
    pub fn new_temp_var(&mut self, method: MethodId, ty: TypeId) -> VarId {
        let state = &mut self.method_states[method.index()];
        let name = format!("%tmp{}", state.next_temp);
        state.next_temp += 1;
        self.var(method, &name, ty)
    }

    fn push(&mut self, method: MethodId, stmt: Stmt) -> StmtId {
        let body = &mut self.program.methods[method.index()].body;
        body.push(stmt);
        StmtId {
            method,
            index: body.len() - 1,
        }
    }

    /// `lhs = new ty`
    pub fn new_obj(&mut self, method: MethodId, lhs: VarId, ty: TypeId) -> StmtId {
        self.push(method, Stmt::New { lhs, ty })
    }

    pub fn assign_literal(&mut self, method: MethodId, lhs: VarId, literal: Literal) -> StmtId {
        self.push(method, Stmt::AssignLiteral { lhs, literal })
    }

    pub fn copy(&mut self, method: MethodId, lhs: VarId, rhs: VarId) -> StmtId {
        self.push(method, Stmt::Copy { lhs, rhs })
    }

    pub fn cast(&mut self, method: MethodId, lhs: VarId, rhs: VarId, ty: TypeId) -> StmtId {
        self.push(method, Stmt::Cast { lhs, rhs, ty })
    }

    pub fn load_field(&mut self, method: MethodId, lhs: VarId, base: Option<VarId>, field: FieldId) -> StmtId {
        self.push(method, Stmt::LoadField { lhs, base, field })
    }

    pub fn store_field(&mut self, method: MethodId, base: Option<VarId>, field: FieldId, rhs: VarId) -> StmtId {
        self.push(method, Stmt::StoreField { base, field, rhs })
    }

    pub fn load_array(&mut self, method: MethodId, lhs: VarId, base: VarId) -> StmtId {
        self.push(method, Stmt::LoadArray { lhs, base })
    }

    pub fn store_array(&mut self, method: MethodId, base: VarId, rhs: VarId) -> StmtId {
        self.push(method, Stmt::StoreArray { base, rhs })
    }

    pub fn ret(&mut self, method: MethodId, value: Option<VarId>) -> StmtId {
        self.push(method, Stmt::Return { value })
    }

    pub fn throw(&mut self, method: MethodId, value: VarId) -> StmtId {
        self.push(method, Stmt::Throw { value })
    }

    /// `lhs = catch`, to be named as the target of a handler.
    pub fn catch(&mut self, method: MethodId, lhs: VarId) -> StmtId {
        self.push(method, Stmt::Catch { lhs })
    }

    /// Guards the statements `start..end` of `handler.method` with the
    /// `Catch` statement `handler`.
    pub fn handler(&mut self, handler: StmtId, start: usize, end: usize, catch_type: TypeId) {
        self.program.methods[handler.method.index()].handlers.push(ExceptionHandler {
            start,
            end,
            catch_type,
            handler: handler.index,
        });
    }

    /// Adds a call site to `method` and the statement invoking it.
    pub fn invoke(
        &mut self,
        method: MethodId,
        kind: CallKind,
        method_ref: MethodRef,
        recv: Option<VarId>,
        args: &[VarId],
        result: Option<VarId>,
    ) -> CallSiteId {
        let id = CallSiteId::new(self.program.call_sites.len());
        self.program.call_sites.push(CallSiteDef {
            container: method,
            kind,
            method_ref,
            recv,
            args: args.to_vec(),
            result,
        });
        self.push(method, Stmt::Invoke { call_site: id });
        id
    }

    /// The reference naming `method` at a call site.
    pub fn method_ref(&self, method: MethodId) -> MethodRef {
        let def = &self.program.methods[method.index()];
        MethodRef::new(def.class, def.subsignature.clone())
    }

    pub fn set_main(&mut self, method: MethodId) {
        self.program.main_method = Some(method);
    }

    pub fn add_implicit_entry(&mut self, method: MethodId) {
        self.program.implicit_entries.push(method);
    }

    /// Validates the program and derives its indices.
    pub fn build(self) -> Result<Program> {
        let mut program = self.program;
        program.finish()?;
        Ok(program)
    }
}

#[cfg(test)]
mod test {
    use super::ProgramBuilder;
    use crate::ir::call_site::{CallKind, MethodRef};
    use crate::ir::program::Stmt;

    #[test]
    fn temporaries_are_numbered_per_method() {
        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let a_ty = pb.class_type(a);
        let m1 = pb.method(a, "m1", &[], true);
        let m2 = pb.method(a, "m2", &[a_ty], false);
        let t0 = pb.new_temp_var(m1, a_ty);
        let t1 = pb.new_temp_var(m1, a_ty);
        let u0 = pb.new_temp_var(m2, a_ty);
        let program = pb.build().unwrap();
        assert_eq!(program.var(t0).name, "%tmp0");
        assert_eq!(program.var(t1).name, "%tmp1");
        assert_eq!(program.var(u0).name, "%tmp0");
        assert_eq!(program.method(m2).subsignature, "m2(A)");
        assert!(program.method(m2).this.is_some());
        assert_eq!(program.method_sig(m2), "<A: m2(A)>");
    }

    #[test]
    fn program_round_trips_through_json() {
        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let a_ty = pb.class_type(a);
        let main = pb.method(a, "main", &[], true);
        let x = pb.var(main, "x", a_ty);
        let y = pb.var(main, "y", a_ty);
        pb.new_obj(main, x, a_ty);
        pb.copy(main, y, x);
        pb.ret(main, Some(y));
        pb.set_main(main);
        let program = pb.build().unwrap();

        let json = serde_json::to_string(&program).unwrap();
        let loaded = crate::ir::program::Program::from_json(&json).unwrap();
        assert_eq!(loaded.main_method, Some(main));
        assert!(matches!(loaded.stmt(crate::ir::program::StmtId { method: main, index: 1 }), Stmt::Copy { .. }));
        assert_eq!(loaded.ret_vars(main), &[y]);
        assert!(loaded.is_concerned(x));
    }

    #[test]
    fn dangling_ids_are_rejected() {
        let json = r#"{
            "types": [{"name": "A", "kind": {"Class": 0}}],
            "classes": [{"name": "A", "ty": 0, "methods": [0]}],
            "methods": [{"name": "m", "subsignature": "m()", "class": 0, "is_static": true,
                         "body": [{"op": "New", "lhs": 7, "ty": 0}]}]
        }"#;
        let err = crate::ir::program::Program::from_json(json).unwrap_err();
        assert!(matches!(err, crate::error::Error::MalformedIr(_)));
    }

    #[test]
    fn static_calls_must_resolve() {
        let mut pb = ProgramBuilder::new();
        let object = pb.class("Object", None);
        let a = pb.class("A", Some(object));
        pb.method(object, "hash", &[], true);
        let main = pb.method(a, "main", &[], true);
        pb.invoke(main, CallKind::Static, MethodRef::new(a, "hash()"), None, &[], None);
        assert!(pb.build().is_ok());

        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let main = pb.method(a, "main", &[], true);
        pb.invoke(main, CallKind::Static, MethodRef::new(a, "missing()"), None, &[], None);
        let err = pb.build().unwrap_err();
        assert!(matches!(err, crate::error::Error::MalformedIr(_)));
    }

    #[test]
    fn handlers_must_target_catch_statements() {
        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let a_ty = pb.class_type(a);
        let main = pb.method(a, "main", &[], true);
        let e = pb.var(main, "e", a_ty);
        pb.new_obj(main, e, a_ty);
        let thrown = pb.throw(main, e);
        let caught = pb.catch(main, e);
        pb.handler(caught, 0, 2, a_ty);
        let program = pb.build().unwrap();
        assert_eq!(program.handlers_of(thrown).count(), 1);
        assert_eq!(program.handlers_of(caught).count(), 0);

        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let a_ty = pb.class_type(a);
        let main = pb.method(a, "main", &[], true);
        let e = pb.var(main, "e", a_ty);
        let not_catch = pb.new_obj(main, e, a_ty);
        pb.handler(not_catch, 0, 1, a_ty);
        assert!(pb.build().is_err());
    }
}
