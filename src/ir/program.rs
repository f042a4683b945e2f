// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The analyzed program: classes, methods, fields, variables, statements
//! and call sites, addressed by dense ids.

use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::call_site::{CallKind, CallSiteDef, MethodRef};
use crate::error::{Error, Result};
use crate::util::bit_vec::Idx;

crate::index_type! {
    pub struct TypeId;
}
crate::index_type! {
    pub struct ClassId;
}
crate::index_type! {
    pub struct MethodId;
}
crate::index_type! {
    pub struct FieldId;
}
crate::index_type! {
    pub struct VarId;
}
crate::index_type! {
    pub struct CallSiteId;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class(ClassId),
    Array(TypeId),
    Null,
    Primitive,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDef {
    /// Class and array types hold references to heap objects.
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Class(_) | TypeKind::Array(_))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// The type whose instances are objects of this class.
    pub ty: TypeId,
    #[serde(default)]
    pub super_class: Option<ClassId>,
    #[serde(default)]
    pub interfaces: Vec<ClassId>,
    #[serde(default)]
    pub is_interface: bool,
    /// Application classes, as opposed to library classes.
    #[serde(default = "default_true")]
    pub is_application: bool,
    #[serde(default)]
    pub methods: Vec<MethodId>,
    #[serde(default)]
    pub fields: Vec<FieldId>,
    /// The class initializer.
    #[serde(default)]
    pub clinit: Option<MethodId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub class: ClassId,
    pub ty: TypeId,
    #[serde(default)]
    pub is_static: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    /// Name and parameter types, e.g. `foo(A,B)`. Dispatch matches on it.
    pub subsignature: String,
    pub class: ClassId,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub this: Option<VarId>,
    #[serde(default)]
    pub params: Vec<VarId>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Exception table, in the order the handlers are tried.
    #[serde(default)]
    pub handlers: Vec<ExceptionHandler>,
}

/// Statements `start..end` of a method are guarded by the `Catch`
/// statement at index `handler` for objects of a subtype of `catch_type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub start: usize,
    pub end: usize,
    pub catch_type: TypeId,
    pub handler: usize,
}

impl ExceptionHandler {
    #[inline]
    pub fn covers(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VarDef {
    pub name: String,
    pub method: MethodId,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Number(i64),
    Str(String),
    /// A class literal, e.g. `A.class`.
    Class(TypeId),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Stmt {
    /// `lhs = new ty`
    New { lhs: VarId, ty: TypeId },
    /// `lhs = literal`
    AssignLiteral { lhs: VarId, literal: Literal },
    /// `lhs = rhs`
    Copy { lhs: VarId, rhs: VarId },
    /// `lhs = (ty) rhs`
    Cast { lhs: VarId, rhs: VarId, ty: TypeId },
    /// `lhs = base.field`, or `lhs = C.field` when `base` is absent.
    LoadField {
        lhs: VarId,
        #[serde(default)]
        base: Option<VarId>,
        field: FieldId,
    },
    /// `base.field = rhs`, or `C.field = rhs` when `base` is absent.
    StoreField {
        #[serde(default)]
        base: Option<VarId>,
        field: FieldId,
        rhs: VarId,
    },
    /// `lhs = base[*]`
    LoadArray { lhs: VarId, base: VarId },
    /// `base[*] = rhs`
    StoreArray { base: VarId, rhs: VarId },
    Invoke { call_site: CallSiteId },
    Return {
        #[serde(default)]
        value: Option<VarId>,
    },
    /// `throw value`
    Throw { value: VarId },
    /// `lhs = catch`, the entry of an exception handler.
    Catch { lhs: VarId },
}

/// A statement position, used to name allocation sites.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StmtId {
    pub method: MethodId,
    pub index: usize,
}

/// Uses of a variable as receiver or base, collected once after the
/// program is loaded.
#[derive(Clone, Debug, Default)]
pub struct VarUses {
    /// Instance call sites with this variable as receiver.
    pub invokes: Vec<CallSiteId>,
    /// `(lhs, field)` of `lhs = v.field`.
    pub load_fields: Vec<(VarId, FieldId)>,
    /// `(field, rhs)` of `v.field = rhs`.
    pub store_fields: Vec<(FieldId, VarId)>,
    /// `lhs` of `lhs = v[*]`.
    pub load_arrays: Vec<VarId>,
    /// `rhs` of `v[*] = rhs`.
    pub store_arrays: Vec<VarId>,
}

#[derive(Clone, Debug, Default)]
struct DerivedIndex {
    var_uses: Vec<VarUses>,
    ret_vars: Vec<Vec<VarId>>,
    call_site_stmts: Vec<Option<StmtId>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Program {
    pub types: Vec<TypeDef>,
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub vars: Vec<VarDef>,
    #[serde(default)]
    pub call_sites: Vec<CallSiteDef>,
    /// The class every class and array type is assignable to, if the
    /// language has one.
    #[serde(default)]
    pub object_class: Option<ClassId>,
    /// Interfaces every array type implements besides the object class.
    #[serde(default)]
    pub array_interfaces: Vec<ClassId>,
    #[serde(default)]
    pub main_method: Option<MethodId>,
    /// Methods the runtime may call on its own (callbacks, lifecycle).
    #[serde(default)]
    pub implicit_entries: Vec<MethodId>,
    #[serde(skip)]
    index: DerivedIndex,
}

impl Program {
    /// Loads a program from its JSON form, checks it and builds the
    /// variable use index.
    pub fn from_json(json: &str) -> Result<Program> {
        let mut program: Program = serde_json::from_str(json)?;
        program.finish()?;
        Ok(program)
    }

    /// Validates every id reference and derives the read-only indices used
    /// by the solver. Must be called once after construction.
    pub fn finish(&mut self) -> Result<()> {
        self.validate()?;
        self.build_indices();
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let check = |kind: &str, idx: usize, len: usize, owner: &dyn fmt::Display| -> Result<()> {
            if idx >= len {
                Err(Error::MalformedIr(format!("{} references unknown {} #{}", owner, kind, idx)))
            } else {
                Ok(())
            }
        };
        let n_types = self.types.len();
        let n_classes = self.classes.len();
        let n_methods = self.methods.len();
        let n_fields = self.fields.len();
        let n_vars = self.vars.len();
        let n_call_sites = self.call_sites.len();

        for (i, ty) in self.types.iter().enumerate() {
            let owner = format!("type #{}", i);
            match ty.kind {
                TypeKind::Class(c) => check("class", c.index(), n_classes, &owner)?,
                TypeKind::Array(e) => check("type", e.index(), n_types, &owner)?,
                TypeKind::Null | TypeKind::Primitive => {}
            }
        }
        for (i, class) in self.classes.iter().enumerate() {
            let owner = format!("class {}", class.name);
            check("type", class.ty.index(), n_types, &owner)?;
            if self.types[class.ty.index()].kind != TypeKind::Class(ClassId::new(i)) {
                return Err(Error::MalformedIr(format!("{} has a non-matching type", owner)));
            }
            for c in class.super_class.iter().chain(class.interfaces.iter()) {
                check("class", c.index(), n_classes, &owner)?;
            }
            for m in class.methods.iter().chain(class.clinit.iter()) {
                check("method", m.index(), n_methods, &owner)?;
            }
            for f in &class.fields {
                check("field", f.index(), n_fields, &owner)?;
            }
        }
        for field in &self.fields {
            let owner = format!("field {}", field.name);
            check("class", field.class.index(), n_classes, &owner)?;
            check("type", field.ty.index(), n_types, &owner)?;
        }
        for var in &self.vars {
            let owner = format!("variable {}", var.name);
            check("method", var.method.index(), n_methods, &owner)?;
            check("type", var.ty.index(), n_types, &owner)?;
        }
        for (i, cs) in self.call_sites.iter().enumerate() {
            let owner = format!("call site #{}", i);
            check("method", cs.container.index(), n_methods, &owner)?;
            check("class", cs.method_ref.class.index(), n_classes, &owner)?;
            for v in cs.recv.iter().chain(cs.args.iter()).chain(cs.result.iter()) {
                check("variable", v.index(), n_vars, &owner)?;
            }
            if cs.kind.has_receiver() && cs.recv.is_none() {
                return Err(Error::MalformedIr(format!("{} is an instance call without receiver", owner)));
            }
        }
        for (i, cs) in self.call_sites.iter().enumerate() {
            // Statically bound references must name a declared method.
            if matches!(cs.kind, CallKind::Static | CallKind::Special) && !self.declares_method(&cs.method_ref) {
                return Err(Error::MalformedIr(format!(
                    "call site #{} references unknown method {}",
                    i,
                    self.method_ref_sig(&cs.method_ref)
                )));
            }
        }
        for (i, method) in self.methods.iter().enumerate() {
            let owner = format!("method {}", method.subsignature);
            check("class", method.class.index(), n_classes, &owner)?;
            for v in method.this.iter().chain(method.params.iter()) {
                check("variable", v.index(), n_vars, &owner)?;
            }
            for stmt in &method.body {
                for v in stmt.vars() {
                    check("variable", v.index(), n_vars, &owner)?;
                    if self.vars[v.index()].method.index() != i {
                        return Err(Error::MalformedIr(format!(
                            "{} uses variable {} of another method",
                            owner,
                            self.vars[v.index()].name
                        )));
                    }
                }
                match stmt {
                    Stmt::New { ty, .. } | Stmt::Cast { ty, .. } => check("type", ty.index(), n_types, &owner)?,
                    Stmt::AssignLiteral { literal: Literal::Class(ty), .. } => {
                        check("type", ty.index(), n_types, &owner)?
                    }
                    Stmt::LoadField { field, .. } | Stmt::StoreField { field, .. } => {
                        check("field", field.index(), n_fields, &owner)?
                    }
                    Stmt::Invoke { call_site } => {
                        check("call site", call_site.index(), n_call_sites, &owner)?;
                        if self.call_sites[call_site.index()].container.index() != i {
                            return Err(Error::MalformedIr(format!(
                                "{} invokes call site #{} of another method",
                                owner,
                                call_site.index()
                            )));
                        }
                    }
                    _ => {}
                }
            }
            for handler in &method.handlers {
                check("type", handler.catch_type.index(), n_types, &owner)?;
                let catches = method.body.get(handler.handler).map_or(false, |s| matches!(s, Stmt::Catch { .. }));
                if handler.start > handler.end || handler.end > method.body.len() || !catches {
                    return Err(Error::MalformedIr(format!(
                        "{} has an exception handler with a bad range or target",
                        owner
                    )));
                }
            }
        }
        for m in self.main_method.iter().chain(self.implicit_entries.iter()) {
            check("method", m.index(), n_methods, &"entry list")?;
        }
        for c in self.object_class.iter().chain(self.array_interfaces.iter()) {
            check("class", c.index(), n_classes, &"array supertypes")?;
        }
        Ok(())
    }

    /// Returns true if `method_ref` names a method declared in its class,
    /// a superclass or a super-interface.
    fn declares_method(&self, method_ref: &MethodRef) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![method_ref.class];
        while let Some(c) = stack.pop() {
            if !visited.insert(c) {
                continue;
            }
            let class = self.class(c);
            if class
                .methods
                .iter()
                .any(|m| self.method(*m).subsignature == method_ref.subsignature)
            {
                return true;
            }
            stack.extend(class.super_class.iter().chain(class.interfaces.iter()).copied());
        }
        false
    }

    fn build_indices(&mut self) {
        let mut index = DerivedIndex {
            var_uses: vec![VarUses::default(); self.vars.len()],
            ret_vars: vec![Vec::new(); self.methods.len()],
            call_site_stmts: vec![None; self.call_sites.len()],
        };
        for (m, method) in self.methods.iter().enumerate() {
            for (i, stmt) in method.body.iter().enumerate() {
                match stmt {
                    Stmt::LoadField { lhs, base: Some(base), field } => {
                        index.var_uses[base.index()].load_fields.push((*lhs, *field));
                    }
                    Stmt::StoreField { base: Some(base), field, rhs } => {
                        index.var_uses[base.index()].store_fields.push((*field, *rhs));
                    }
                    Stmt::LoadArray { lhs, base } => {
                        index.var_uses[base.index()].load_arrays.push(*lhs);
                    }
                    Stmt::StoreArray { base, rhs } => {
                        index.var_uses[base.index()].store_arrays.push(*rhs);
                    }
                    Stmt::Invoke { call_site } => {
                        index.call_site_stmts[call_site.index()] = Some(StmtId {
                            method: MethodId::new(m),
                            index: i,
                        });
                        if let Some(recv) = self.call_sites[call_site.index()].recv {
                            index.var_uses[recv.index()].invokes.push(*call_site);
                        }
                    }
                    Stmt::Return { value: Some(value) } => {
                        if !index.ret_vars[m].contains(value) {
                            index.ret_vars[m].push(*value);
                        }
                    }
                    _ => {}
                }
            }
        }
        self.index = index;
    }

    #[inline]
    pub fn ty(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    #[inline]
    pub fn class(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    #[inline]
    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &VarDef {
        &self.vars[id.index()]
    }

    #[inline]
    pub fn call_site(&self, id: CallSiteId) -> &CallSiteDef {
        &self.call_sites[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.methods[id.method.index()].body[id.index]
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId::new)
    }

    pub fn var_uses(&self, var: VarId) -> &VarUses {
        &self.index.var_uses[var.index()]
    }

    /// Variables returned by the method.
    pub fn ret_vars(&self, method: MethodId) -> &[VarId] {
        &self.index.ret_vars[method.index()]
    }

    pub fn call_site_stmt(&self, call_site: CallSiteId) -> Option<StmtId> {
        self.index.call_site_stmts[call_site.index()]
    }

    /// Handlers guarding `stmt`, in the order they are tried.
    pub fn handlers_of(&self, stmt: StmtId) -> impl Iterator<Item = &ExceptionHandler> {
        self.method(stmt.method)
            .handlers
            .iter()
            .filter(move |h| h.covers(stmt.index))
    }

    /// Returns true if the variable can hold references to heap objects.
    #[inline]
    pub fn is_concerned(&self, var: VarId) -> bool {
        self.ty(self.var(var).ty).is_reference()
    }

    /// The class of objects of the given type, if it is a class type.
    pub fn class_of_type(&self, ty: TypeId) -> Option<ClassId> {
        match self.ty(ty).kind {
            TypeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn element_type(&self, ty: TypeId) -> Option<TypeId> {
        match self.ty(ty).kind {
            TypeKind::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_application_method(&self, method: MethodId) -> bool {
        self.class(self.method(method).class).is_application
    }

    pub fn method_ref_of(&self, method: MethodId) -> MethodRef {
        let def = self.method(method);
        MethodRef::new(def.class, def.subsignature.clone())
    }

    /// Finds a method by its `<Class: subsignature>` form.
    pub fn find_method(&self, signature: &str) -> Option<MethodId> {
        self.method_ids().find(|m| self.method_sig(*m) == signature)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.classes.iter().position(|c| c.name == name).map(ClassId::new)
    }

    pub fn method_sig(&self, method: MethodId) -> String {
        let def = self.method(method);
        format!("<{}: {}>", self.class(def.class).name, def.subsignature)
    }

    pub fn method_ref_sig(&self, method_ref: &MethodRef) -> String {
        format!("<{}: {}>", self.class(method_ref.class).name, method_ref.subsignature)
    }

    pub fn var_sig(&self, var: VarId) -> String {
        let def = self.var(var);
        format!("{}/{}", self.method_sig(def.method), def.name)
    }

    pub fn field_sig(&self, field: FieldId) -> String {
        let def = self.field(field);
        format!("<{}: {} {}>", self.class(def.class).name, self.ty(def.ty).name, def.name)
    }

    pub fn call_site_sig(&self, call_site: CallSiteId) -> String {
        let def = self.call_site(call_site);
        let index = self
            .call_site_stmt(call_site)
            .map(|s| s.index.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "{}[{}@{}({})]",
            self.method_sig(def.container),
            index,
            self.method_ref_sig(&def.method_ref),
            def.args.iter().map(|a| self.var(*a).name.as_str()).join(",")
        )
    }
}

impl Stmt {
    /// All variables the statement defines or uses.
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Stmt::New { lhs, .. } | Stmt::AssignLiteral { lhs, .. } => vec![*lhs],
            Stmt::Copy { lhs, rhs } | Stmt::Cast { lhs, rhs, .. } => vec![*lhs, *rhs],
            Stmt::LoadField { lhs, base, .. } => std::iter::once(*lhs).chain(*base).collect(),
            Stmt::StoreField { base, rhs, .. } => std::iter::once(*rhs).chain(*base).collect(),
            Stmt::LoadArray { lhs, base } => vec![*lhs, *base],
            Stmt::StoreArray { base, rhs } => vec![*base, *rhs],
            Stmt::Invoke { .. } => Vec::new(),
            Stmt::Return { value } => value.iter().copied().collect(),
            Stmt::Throw { value } => vec![*value],
            Stmt::Catch { lhs } => vec![*lhs],
        }
    }
}
