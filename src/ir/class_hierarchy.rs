// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::call_site::MethodRef;
use super::program::{ClassId, MethodId, Program, TypeId, TypeKind};
use crate::util::bit_vec::Idx;

/// Subtyping and method lookup over the classes of a program.
pub struct ClassHierarchy {
    program: Rc<Program>,
    /// Direct subclasses and implementors of each class.
    direct_subtypes: Vec<Vec<ClassId>>,
    /// Memoized results of virtual dispatch.
    dispatch_cache: RefCell<HashMap<(ClassId, String), Option<MethodId>>>,
}

impl ClassHierarchy {
    pub fn new(program: Rc<Program>) -> ClassHierarchy {
        let mut direct_subtypes = vec![Vec::new(); program.classes.len()];
        for (i, class) in program.classes.iter().enumerate() {
            for sup in class.super_class.iter().chain(class.interfaces.iter()) {
                direct_subtypes[sup.index()].push(ClassId::new(i));
            }
        }
        ClassHierarchy {
            program,
            direct_subtypes,
            dispatch_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    /// Looks up the method declared in `class` with the given sub-signature.
    pub fn get_declared_method(&self, class: ClassId, subsignature: &str) -> Option<MethodId> {
        self.program
            .class(class)
            .methods
            .iter()
            .copied()
            .find(|m| self.program.method(*m).subsignature == subsignature)
    }

    /// Finds the implementation invoked when a method with `subsignature` is
    /// called on an object of class `class`: the closest non-abstract
    /// declaration along the superclass chain, then a default method from
    /// the implemented interfaces.
    pub fn dispatch(&self, class: ClassId, subsignature: &str) -> Option<MethodId> {
        let key = (class, subsignature.to_string());
        if let Some(cached) = self.dispatch_cache.borrow().get(&key) {
            return *cached;
        }
        let resolved = self.dispatch_uncached(class, subsignature);
        self.dispatch_cache.borrow_mut().insert(key, resolved);
        resolved
    }

    fn dispatch_uncached(&self, class: ClassId, subsignature: &str) -> Option<MethodId> {
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(m) = self.get_declared_method(c, subsignature) {
                if !self.program.method(m).is_abstract {
                    return Some(m);
                }
            }
            current = self.program.class(c).super_class;
        }
        // Default methods, breadth first over the interfaces.
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ClassId> = VecDeque::new();
        let mut current = Some(class);
        while let Some(c) = current {
            queue.extend(self.program.class(c).interfaces.iter().copied());
            current = self.program.class(c).super_class;
        }
        while let Some(itf) = queue.pop_front() {
            if !visited.insert(itf) {
                continue;
            }
            if let Some(m) = self.get_declared_method(itf, subsignature) {
                if !self.program.method(m).is_abstract {
                    return Some(m);
                }
            }
            queue.extend(self.program.class(itf).interfaces.iter().copied());
        }
        None
    }

    /// Resolves a dispatched call for a receiver object of type `recv_type`.
    /// Returns None for non-class receivers other than arrays, whose
    /// methods are looked up on the root object class.
    pub fn resolve_virtual_dispatch(&self, recv_type: TypeId, method_ref: &MethodRef) -> Option<MethodId> {
        let class = match self.program.ty(recv_type).kind {
            TypeKind::Class(class) => class,
            TypeKind::Array(_) => self.program.object_class?,
            TypeKind::Null | TypeKind::Primitive => return None,
        };
        self.dispatch(class, &method_ref.subsignature)
    }

    /// Resolves a method reference statically: the declaration in the
    /// referenced class or the nearest superclass declaring it.
    pub fn resolve_method(&self, method_ref: &MethodRef) -> Option<MethodId> {
        let mut current = Some(method_ref.class);
        while let Some(c) = current {
            if let Some(m) = self.get_declared_method(c, &method_ref.subsignature) {
                return Some(m);
            }
            current = self.program.class(c).super_class;
        }
        self.dispatch(method_ref.class, &method_ref.subsignature)
    }

    /// Returns true if `sub` is `sup` or a transitive subclass or
    /// implementor of it.
    pub fn is_subclass(&self, sup: ClassId, sub: ClassId) -> bool {
        if sup == sub {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![sub];
        while let Some(c) = stack.pop() {
            if c == sup {
                return true;
            }
            if !visited.insert(c) {
                continue;
            }
            let class = self.program.class(c);
            stack.extend(class.super_class.iter().chain(class.interfaces.iter()).copied());
        }
        false
    }

    /// Returns true if a value of type `sub` can be assigned to a variable
    /// of type `sup`.
    pub fn is_subtype(&self, sup: TypeId, sub: TypeId) -> bool {
        if sup == sub {
            return true;
        }
        let sup_kind = &self.program.ty(sup).kind;
        let sub_kind = &self.program.ty(sub).kind;
        match (sup_kind, sub_kind) {
            (TypeKind::Class(_) | TypeKind::Array(_), TypeKind::Null) => true,
            (TypeKind::Class(sup_class), TypeKind::Class(sub_class)) => self.is_subclass(*sup_class, *sub_class),
            (TypeKind::Class(sup_class), TypeKind::Array(_)) => {
                self.program.object_class == Some(*sup_class)
                    || self
                        .program
                        .array_interfaces
                        .iter()
                        .any(|itf| self.is_subclass(*sup_class, *itf))
            }
            (TypeKind::Array(sup_elem), TypeKind::Array(sub_elem)) => {
                let sup_ref = self.program.ty(*sup_elem).is_reference();
                let sub_ref = self.program.ty(*sub_elem).is_reference();
                sup_ref && sub_ref && self.is_subtype(*sup_elem, *sub_elem)
            }
            _ => false,
        }
    }

    /// All transitive subclasses and implementors of `class`, including
    /// `class` itself.
    pub fn get_all_subclasses_of(&self, class: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![class];
        while let Some(c) = stack.pop() {
            if !visited.insert(c) {
                continue;
            }
            result.push(c);
            stack.extend(self.direct_subtypes[c.index()].iter().copied());
        }
        result
    }

    /// Superclass chain of `class`, from the root down to `class`.
    pub fn superclasses_top_down(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(c) = current {
            chain.push(c);
            current = self.program.class(c).super_class;
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::ClassHierarchy;
    use crate::ir::builder::ProgramBuilder;
    use crate::ir::call_site::MethodRef;

    #[test]
    fn dispatch_walks_superclasses_and_default_methods() {
        let mut pb = ProgramBuilder::new();
        let object = pb.class("Object", None);
        let itf = pb.interface("I", &[]);
        let a = pb.class("A", Some(object));
        let b = pb.class("B", Some(a));
        pb.implements(b, itf);
        let a_foo = pb.method(a, "foo", &[], false);
        let itf_bar = pb.method(itf, "bar", &[], false);
        let abs = pb.method(a, "baz", &[], false);
        pb.set_abstract(abs);
        let program = Rc::new(pb.build().unwrap());
        let ch = ClassHierarchy::new(program.clone());

        assert_eq!(ch.dispatch(b, "foo()"), Some(a_foo));
        assert_eq!(ch.dispatch(b, "bar()"), Some(itf_bar));
        assert_eq!(ch.dispatch(b, "baz()"), None);
        let b_ty = program.class(b).ty;
        assert_eq!(ch.resolve_virtual_dispatch(b_ty, &MethodRef::new(a, "foo()")), Some(a_foo));
        assert_eq!(ch.resolve_method(&MethodRef::new(b, "baz()")), Some(abs));
    }

    #[test]
    fn subtyping() {
        let mut pb = ProgramBuilder::new();
        let object = pb.class("Object", None);
        let a = pb.class("A", Some(object));
        let b = pb.class("B", Some(a));
        let c = pb.class("C", Some(object));
        let (object_ty, a_ty, b_ty, c_ty) = (
            pb.class_type(object),
            pb.class_type(a),
            pb.class_type(b),
            pb.class_type(c),
        );
        let a_arr = pb.array_type(a_ty);
        let b_arr = pb.array_type(b_ty);
        let null = pb.null_type();
        let program = Rc::new(pb.build().unwrap());
        let ch = ClassHierarchy::new(program);

        assert!(ch.is_subtype(a_ty, b_ty));
        assert!(!ch.is_subtype(b_ty, a_ty));
        assert!(!ch.is_subtype(c_ty, b_ty));
        assert!(ch.is_subtype(object_ty, a_arr));
        assert!(ch.is_subtype(a_arr, b_arr));
        assert!(!ch.is_subtype(b_arr, a_arr));
        assert!(ch.is_subtype(a_ty, null));
        assert!(!ch.is_subtype(null, a_ty));

        let mut subs = ch.get_all_subclasses_of(a);
        subs.sort();
        assert_eq!(subs, vec![a, b]);
        assert_eq!(ch.superclasses_top_down(b), vec![object, a, b]);
    }

    #[test]
    fn arrays_implement_array_interfaces() {
        let mut pb = ProgramBuilder::new();
        let object = pb.class("Object", None);
        let marker = pb.interface("Marker", &[]);
        let cloneable = pb.interface("Cloneable", &[marker]);
        let other = pb.interface("Runnable", &[]);
        pb.add_array_interface(cloneable);
        let object_ty = pb.class_type(object);
        let arr = pb.array_type(object_ty);
        let (cloneable_ty, marker_ty, other_ty) = (pb.class_type(cloneable), pb.class_type(marker), pb.class_type(other));
        let program = Rc::new(pb.build().unwrap());
        let ch = ClassHierarchy::new(program);

        assert!(ch.is_subtype(cloneable_ty, arr));
        assert!(ch.is_subtype(marker_ty, arr));
        assert!(!ch.is_subtype(other_ty, arr));
        assert!(!ch.is_subtype(arr, cloneable_ty));
    }
}
