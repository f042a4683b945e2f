// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Abstract heap objects. Each allocation site denotes one object; constants
//! and plugin-made mock objects are memoized by value.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ir::program::{Literal, MethodId, Program, StmtId, TypeId};
use crate::util::bit_vec::Idx;

crate::index_type! {
    pub struct ObjId;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// Allocated by a `New` statement.
    New { alloc: StmtId },
    /// A string or class literal.
    Constant { literal: Literal },
    /// Synthesized on request of a plugin.
    Mock { desc: String, key: String },
    /// Stands for all string constants of one type.
    Merged,
}

#[derive(Clone, Debug)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: TypeId,
    /// The method the object is allocated in, if any.
    pub container: Option<MethodId>,
}

impl Obj {
    /// Type used as context element by type sensitivity: the class
    /// declaring the allocating method, or the object's own type.
    pub fn container_type(&self, program: &Program) -> TypeId {
        match self.container {
            Some(method) => program.class(program.method(method).class).ty,
            None => self.ty,
        }
    }
}

pub struct HeapModel {
    program: Rc<Program>,
    objs: Vec<Obj>,
    alloc_objs: HashMap<StmtId, ObjId>,
    constant_objs: HashMap<(Literal, TypeId), ObjId>,
    mock_objs: HashMap<(String, String, TypeId), ObjId>,
    merged_objs: HashMap<TypeId, ObjId>,
    merge_string_constants: bool,
}

impl HeapModel {
    pub fn new(program: Rc<Program>, merge_string_constants: bool) -> Self {
        HeapModel {
            program,
            objs: Vec::new(),
            alloc_objs: HashMap::new(),
            constant_objs: HashMap::new(),
            mock_objs: HashMap::new(),
            merged_objs: HashMap::new(),
            merge_string_constants,
        }
    }

    fn add_obj(&mut self, obj: Obj) -> ObjId {
        let id = ObjId::new(self.objs.len());
        self.objs.push(obj);
        id
    }

    /// The object of the allocation site `alloc`, which creates objects of
    /// type `ty`.
    pub fn get_object(&mut self, alloc: StmtId, ty: TypeId) -> ObjId {
        if let Some(obj) = self.alloc_objs.get(&alloc) {
            return *obj;
        }
        let id = self.add_obj(Obj {
            kind: ObjKind::New { alloc },
            ty,
            container: Some(alloc.method),
        });
        self.alloc_objs.insert(alloc, id);
        id
    }

    /// The object denoting `literal` when assigned to a variable of type `ty`.
    pub fn get_constant_object(&mut self, literal: &Literal, ty: TypeId) -> ObjId {
        if self.merge_string_constants && matches!(literal, Literal::Str(_)) {
            if let Some(obj) = self.merged_objs.get(&ty) {
                return *obj;
            }
            let id = self.add_obj(Obj {
                kind: ObjKind::Merged,
                ty,
                container: None,
            });
            self.merged_objs.insert(ty, id);
            return id;
        }
        let key = (literal.clone(), ty);
        if let Some(obj) = self.constant_objs.get(&key) {
            return *obj;
        }
        let id = self.add_obj(Obj {
            kind: ObjKind::Constant {
                literal: literal.clone(),
            },
            ty,
            container: None,
        });
        self.constant_objs.insert(key, id);
        id
    }

    /// A synthetic object. With `distinct_per_call` unset, equal
    /// `(desc, key, ty)` yield the same object; otherwise every call makes
    /// a fresh one.
    pub fn get_mock_object(
        &mut self,
        desc: &str,
        key: &str,
        ty: TypeId,
        container: Option<MethodId>,
        distinct_per_call: bool,
    ) -> ObjId {
        let obj = Obj {
            kind: ObjKind::Mock {
                desc: desc.to_string(),
                key: key.to_string(),
            },
            ty,
            container,
        };
        if distinct_per_call {
            return self.add_obj(obj);
        }
        let memo_key = (desc.to_string(), key.to_string(), ty);
        if let Some(id) = self.mock_objs.get(&memo_key) {
            return *id;
        }
        let id = self.add_obj(obj);
        self.mock_objs.insert(memo_key, id);
        id
    }

    #[inline]
    pub fn obj(&self, id: ObjId) -> &Obj {
        &self.objs[id.index()]
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjId, &Obj)> {
        self.objs.iter().enumerate().map(|(i, obj)| (ObjId::new(i), obj))
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub fn obj_to_string(&self, id: ObjId) -> String {
        obj_to_string(&self.program, self.obj(id))
    }
}

pub fn obj_to_string(program: &Program, obj: &Obj) -> String {
    let ty = &program.ty(obj.ty).name;
    match &obj.kind {
        ObjKind::New { alloc } => {
            format!("NewObj{{{}[{}]new {}}}", program.method_sig(alloc.method), alloc.index, ty)
        }
        ObjKind::Constant { literal } => match literal {
            Literal::Str(s) => format!("ConstObj{{{}: \"{}\"}}", ty, s),
            Literal::Class(class_ty) => format!("ConstObj{{{}: {}.class}}", ty, program.ty(*class_ty).name),
            Literal::Number(n) => format!("ConstObj{{{}: {}}}", ty, n),
            Literal::Null => format!("ConstObj{{{}: null}}", ty),
        },
        ObjKind::Mock { desc, key } => format!("MockObj{{{}:{},{}}}", desc, key, ty),
        ObjKind::Merged => format!("MergedObj{{<Merged {}>}}", ty),
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::ir::builder::ProgramBuilder;

    fn program() -> (Rc<Program>, MethodId, TypeId) {
        let mut pb = ProgramBuilder::new();
        let a = pb.class("A", None);
        let a_ty = pb.class_type(a);
        let m = pb.method(a, "m", &[], true);
        (Rc::new(pb.build().unwrap()), m, a_ty)
    }

    #[test]
    fn objects_are_memoized() {
        let (program, m, ty) = program();
        let mut heap = HeapModel::new(program, false);
        let alloc = StmtId { method: m, index: 0 };
        assert_eq!(heap.get_object(alloc, ty), heap.get_object(alloc, ty));
        let s1 = heap.get_constant_object(&Literal::Str("a".into()), ty);
        let s2 = heap.get_constant_object(&Literal::Str("b".into()), ty);
        assert_ne!(s1, s2);
        assert_eq!(s1, heap.get_constant_object(&Literal::Str("a".into()), ty));

        let n1 = heap.get_mock_object("null", "", ty, None, false);
        assert_eq!(n1, heap.get_mock_object("null", "", ty, None, false));
        let f1 = heap.get_mock_object("fresh", "", ty, None, true);
        let f2 = heap.get_mock_object("fresh", "", ty, None, true);
        assert_ne!(f1, f2);
        assert_eq!(heap.len(), 6);
        let obj = heap.get_object(alloc, ty);
        assert_eq!(heap.obj_to_string(obj), "NewObj{<A: m()>[0]new A}");
    }

    #[test]
    fn merged_string_constants() {
        let (program, _, ty) = program();
        let mut heap = HeapModel::new(program, true);
        let s1 = heap.get_constant_object(&Literal::Str("a".into()), ty);
        let s2 = heap.get_constant_object(&Literal::Str("b".into()), ty);
        assert_eq!(s1, s2);
        assert_eq!(heap.obj(s1).kind, ObjKind::Merged);
    }
}
