// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Entry points and the objects bound to their parameters.

use std::collections::HashMap;

use super::heap_model::{HeapModel, ObjId};
use crate::ir::program::{FieldId, MethodId, Program, TypeId, TypeKind};

/// Objects an entry method starts with. All of them live in the empty
/// heap context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryBindings {
    pub this: Vec<ObjId>,
    /// Objects of each parameter, by parameter index.
    pub params: HashMap<usize, Vec<ObjId>>,
    /// `(base, field, value)`
    pub fields: Vec<(ObjId, FieldId, ObjId)>,
    /// `(array, element)`
    pub arrays: Vec<(ObjId, ObjId)>,
    pub static_fields: Vec<(FieldId, ObjId)>,
}

pub trait ParamProvider {
    fn bindings(&self, method: MethodId, program: &Program, heap: &mut HeapModel) -> EntryBindings;
}

/// A method the analysis starts from, not reached by any call.
pub struct EntryPoint {
    pub method: MethodId,
    pub param_provider: Box<dyn ParamProvider>,
}

impl EntryPoint {
    pub fn new(method: MethodId, param_provider: Box<dyn ParamProvider>) -> Self {
        EntryPoint { method, param_provider }
    }
}

/// Binds nothing.
pub struct EmptyParamProvider;

impl ParamProvider for EmptyParamProvider {
    fn bindings(&self, _method: MethodId, _program: &Program, _heap: &mut HeapModel) -> EntryBindings {
        EntryBindings::default()
    }
}

/// Makes one mock object per reference-typed `this` and parameter, of the
/// declared type. With a positive `depth`, objects reachable through
/// instance fields and array slots are made as well, up to `depth` levels.
pub struct DeclaredParamProvider {
    depth: usize,
}

const ENTRY_OBJ_DESC: &str = "EntryPointObj";

impl DeclaredParamProvider {
    pub fn new(depth: usize) -> Self {
        DeclaredParamProvider { depth }
    }

    fn make_obj(
        &self,
        key: String,
        ty: TypeId,
        level: usize,
        program: &Program,
        heap: &mut HeapModel,
        bindings: &mut EntryBindings,
    ) -> ObjId {
        let obj = heap.get_mock_object(ENTRY_OBJ_DESC, &key, ty, None, false);
        if level >= self.depth {
            return obj;
        }
        match program.ty(ty).kind {
            TypeKind::Class(class) => {
                let mut current = Some(class);
                while let Some(c) = current {
                    for field in &program.class(c).fields {
                        let def = program.field(*field);
                        if def.is_static || !program.ty(def.ty).is_reference() {
                            continue;
                        }
                        let field_key = format!("{}.{}", key, def.name);
                        let value = self.make_obj(field_key, def.ty, level + 1, program, heap, bindings);
                        bindings.fields.push((obj, *field, value));
                    }
                    current = program.class(c).super_class;
                }
            }
            TypeKind::Array(elem) if program.ty(elem).is_reference() => {
                let value = self.make_obj(format!("{}[*]", key), elem, level + 1, program, heap, bindings);
                bindings.arrays.push((obj, value));
            }
            _ => {}
        }
        obj
    }
}

impl ParamProvider for DeclaredParamProvider {
    fn bindings(&self, method: MethodId, program: &Program, heap: &mut HeapModel) -> EntryBindings {
        let mut bindings = EntryBindings::default();
        let def = program.method(method);
        let sig = program.method_sig(method);
        if let Some(this) = def.this {
            let ty = program.var(this).ty;
            let obj = self.make_obj(format!("{}/this", sig), ty, 0, program, heap, &mut bindings);
            bindings.this.push(obj);
        }
        for (i, param) in def.params.iter().enumerate() {
            let ty = program.var(*param).ty;
            if !program.ty(ty).is_reference() {
                continue;
            }
            let obj = self.make_obj(format!("{}/param{}", sig, i), ty, 0, program, heap, &mut bindings);
            bindings.params.entry(i).or_default().push(obj);
        }
        bindings
    }
}

/// Binds explicitly given objects.
#[derive(Default)]
pub struct SpecifiedParamProvider {
    bindings: EntryBindings,
}

impl SpecifiedParamProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_this(mut self, obj: ObjId) -> Self {
        self.bindings.this.push(obj);
        self
    }

    pub fn add_param(mut self, index: usize, obj: ObjId) -> Self {
        self.bindings.params.entry(index).or_default().push(obj);
        self
    }

    pub fn add_field(mut self, base: ObjId, field: FieldId, obj: ObjId) -> Self {
        self.bindings.fields.push((base, field, obj));
        self
    }

    pub fn add_array(mut self, array: ObjId, elem: ObjId) -> Self {
        self.bindings.arrays.push((array, elem));
        self
    }

    pub fn add_static_field(mut self, field: FieldId, obj: ObjId) -> Self {
        self.bindings.static_fields.push((field, obj));
        self
    }
}

impl ParamProvider for SpecifiedParamProvider {
    fn bindings(&self, _method: MethodId, _program: &Program, _heap: &mut HeapModel) -> EntryBindings {
        self.bindings.clone()
    }
}
