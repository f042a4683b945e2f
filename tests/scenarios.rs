// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use cspta::ir::builder::ProgramBuilder;
use cspta::ir::call_site::CallKind;
use cspta::ir::program::{Literal, Program, VarId};

use common::{analyze, options, pts_strings, pts_types};

#[test]
fn cast_to_unrelated_type_drops_objects() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let a = pb.class("A", Some(object));
    let b = pb.class("B", Some(object));
    let main_class = pb.class("Main", Some(object));
    let (a_ty, b_ty) = (pb.class_type(a), pb.class_type(b));
    let main = pb.method(main_class, "main", &[], true);
    let x = pb.var(main, "x", a_ty);
    let y = pb.var(main, "y", a_ty);
    let z = pb.var(main, "z", b_ty);
    pb.new_obj(main, x, a_ty);
    pb.copy(main, y, x);
    pb.cast(main, z, y, b_ty);
    pb.set_main(main);

    let result = analyze(pb.build().unwrap(), &options("ci"));
    assert_eq!(pts_types(&result, x), vec!["A"]);
    assert_eq!(result.points_to(x), result.points_to(y));
    assert!(result.points_to(z).is_empty());
}

#[test]
fn virtual_call_reaches_every_override() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let a = pb.class("A", Some(object));
    let c1 = pb.class("C1", Some(a));
    let c2 = pb.class("C2", Some(a));
    let r1 = pb.class("R1", Some(object));
    let r2 = pb.class("R2", Some(object));
    let main_class = pb.class("Main", Some(object));
    let object_ty = pb.class_type(object);
    let a_ty = pb.class_type(a);

    let a_m = pb.method(a, "m", &[], false);
    pb.set_abstract(a_m);
    let mut overrides = Vec::new();
    for (class, ret_class) in [(c1, r1), (c2, r2)] {
        let m = pb.method(class, "m", &[], false);
        let v = pb.var(m, "v", object_ty);
        let ret_ty = pb.class_type(ret_class);
        pb.new_obj(m, v, ret_ty);
        pb.ret(m, Some(v));
        overrides.push(m);
    }

    let main = pb.method(main_class, "main", &[], true);
    let recv = pb.var(main, "recv", a_ty);
    let r = pb.var(main, "r", object_ty);
    let (c1_ty, c2_ty) = (pb.class_type(c1), pb.class_type(c2));
    pb.new_obj(main, recv, c1_ty);
    pb.new_obj(main, recv, c2_ty);
    let m_ref = pb.method_ref(a_m);
    let call = pb.invoke(main, CallKind::Virtual, m_ref, Some(recv), &[], Some(r));
    pb.set_main(main);

    let result = analyze(pb.build().unwrap(), &options("ci"));
    let callees: Vec<_> = result.ci_call_graph().get_callees(&call).into_iter().collect();
    assert_eq!(callees, overrides);
    assert_eq!(pts_types(&result, r), vec!["R1", "R2"]);
}

fn static_field_program(store_first: bool) -> (Program, VarId) {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let t = pb.class("T", Some(object));
    let o = pb.class("O", Some(object));
    let main_class = pb.class("Main", Some(object));
    let o_ty = pb.class_type(o);
    let f = pb.field(t, "f", o_ty, true);

    let store = pb.method(main_class, "store", &[], true);
    let v = pb.var(store, "v", o_ty);
    pb.new_obj(store, v, o_ty);
    pb.store_field(store, None, f, v);

    let load = pb.method(main_class, "load", &[], true);
    let x = pb.var(load, "x", o_ty);
    pb.load_field(load, x, None, f);

    let main = pb.method(main_class, "main", &[], true);
    let order = if store_first { [store, load] } else { [load, store] };
    for m in order {
        let m_ref = pb.method_ref(m);
        pb.invoke(main, CallKind::Static, m_ref, None, &[], None);
    }
    pb.set_main(main);
    (pb.build().unwrap(), x)
}

#[test]
fn static_fields_ignore_processing_order() {
    for store_first in [true, false] {
        let (program, x) = static_field_program(store_first);
        for cs in ["ci", "2-call"] {
            let result = analyze(program.clone(), &options(cs));
            assert_eq!(
                pts_strings(&result, x),
                vec!["NewObj{<Main: store()>[0]new O}"],
                "store first: {}, context sensitivity: {}",
                store_first,
                cs
            );
        }
    }
}

#[test]
fn recursion_terminates() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let node = pb.class("Node", Some(object));
    let main_class = pb.class("Main", Some(object));
    let node_ty = pb.class_type(node);
    let next = pb.field(node, "next", node_ty, false);

    let m = pb.method(main_class, "m", &[node_ty], true);
    let n = pb.param(m, 0);
    let t = pb.var(m, "t", node_ty);
    pb.load_field(m, t, Some(n), next);
    let m_ref = pb.method_ref(m);
    pb.invoke(m, CallKind::Static, m_ref.clone(), None, &[t], None);

    let main = pb.method(main_class, "main", &[], true);
    let head = pb.var(main, "head", node_ty);
    let tail = pb.var(main, "tail", node_ty);
    pb.new_obj(main, head, node_ty);
    pb.new_obj(main, tail, node_ty);
    pb.store_field(main, Some(head), next, tail);
    pb.store_field(main, Some(tail), next, head);
    pb.invoke(main, CallKind::Static, m_ref, None, &[head], None);
    pb.set_main(main);
    let program = pb.build().unwrap();

    for cs in ["ci", "1-call", "3-call", "2-obj", "2-type"] {
        let result = analyze(program.clone(), &options(cs));
        assert!(result.reachable_methods().contains(&m), "{}", cs);
        assert_eq!(result.points_to(n).len(), 2, "{}", cs);
        assert_eq!(result.points_to(t).len(), 2, "{}", cs);
    }
}

#[test]
fn null_literals_share_one_object() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let a = pb.class("A", Some(object));
    let main_class = pb.class("Main", Some(object));
    let a_ty = pb.class_type(a);
    pb.null_type();

    let helper = pb.method(main_class, "helper", &[], true);
    let y = pb.var(helper, "y", a_ty);
    pb.assign_literal(helper, y, Literal::Null);

    let main = pb.method(main_class, "main", &[], true);
    let x = pb.var(main, "x", a_ty);
    let z = pb.var(main, "z", a_ty);
    pb.assign_literal(main, x, Literal::Null);
    pb.assign_literal(main, z, Literal::Null);
    let helper_ref = pb.method_ref(helper);
    pb.invoke(main, CallKind::Static, helper_ref, None, &[], None);
    pb.set_main(main);
    let program = pb.build().unwrap();

    let result = analyze(program.clone(), &options("ci"));
    assert!(result.points_to(x).is_empty());

    let mut null_options = options("1-call");
    null_options.model_null_literals = true;
    let result = analyze(program, &null_options);
    let null_objs = result.points_to(x);
    assert_eq!(null_objs.len(), 1);
    assert_eq!(result.points_to(y), null_objs);
    assert_eq!(result.points_to(z), null_objs);
    assert!(pts_strings(&result, x)[0].starts_with("MockObj{NullObj:"));
}

#[test]
fn array_stores_drop_incompatible_elements() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let b = pb.class("B", Some(object));
    let d = pb.class("D", Some(b));
    let c = pb.class("C", Some(object));
    let main_class = pb.class("Main", Some(object));
    let object_ty = pb.class_type(object);
    let (b_ty, c_ty, d_ty) = (pb.class_type(b), pb.class_type(c), pb.class_type(d));
    let b_arr = pb.array_type(b_ty);

    let main = pb.method(main_class, "main", &[], true);
    let arr = pb.var(main, "arr", b_arr);
    let (ob, oc, od) = (pb.var(main, "ob", object_ty), pb.var(main, "oc", object_ty), pb.var(main, "od", object_ty));
    let e = pb.var(main, "e", object_ty);
    pb.new_obj(main, arr, b_arr);
    pb.new_obj(main, ob, b_ty);
    pb.new_obj(main, oc, c_ty);
    pb.new_obj(main, od, d_ty);
    pb.store_array(main, arr, ob);
    pb.store_array(main, arr, oc);
    pb.store_array(main, arr, od);
    pb.load_array(main, e, arr);
    pb.set_main(main);

    let result = analyze(pb.build().unwrap(), &options("ci"));
    assert_eq!(pts_types(&result, e), vec!["B", "D"]);
}

#[test]
fn special_calls_skip_dispatch_and_interface_calls_dispatch() {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let itf = pb.interface("I", &[]);
    let c1 = pb.class("C1", Some(object));
    pb.implements(c1, itf);
    let c2 = pb.class("C2", Some(c1));
    let r1 = pb.class("R1", Some(object));
    let r2 = pb.class("R2", Some(object));
    let main_class = pb.class("Main", Some(object));
    let object_ty = pb.class_type(object);
    let itf_ty = pb.class_type(itf);

    let itf_m = pb.method(itf, "m", &[], false);
    pb.set_abstract(itf_m);
    let mut impls = Vec::new();
    for (class, ret_class) in [(c1, r1), (c2, r2)] {
        let m = pb.method(class, "m", &[], false);
        let v = pb.var(m, "v", object_ty);
        let ret_ty = pb.class_type(ret_class);
        pb.new_obj(m, v, ret_ty);
        pb.ret(m, Some(v));
        impls.push(m);
    }

    let main = pb.method(main_class, "main", &[], true);
    let recv = pb.var(main, "recv", itf_ty);
    let (r_special, r_itf) = (pb.var(main, "rs", object_ty), pb.var(main, "ri", object_ty));
    let c2_ty = pb.class_type(c2);
    pb.new_obj(main, recv, c2_ty);
    let c1_m_ref = pb.method_ref(impls[0]);
    let special = pb.invoke(main, CallKind::Special, c1_m_ref, Some(recv), &[], Some(r_special));
    let itf_m_ref = pb.method_ref(itf_m);
    let interface = pb.invoke(main, CallKind::Interface, itf_m_ref, Some(recv), &[], Some(r_itf));
    pb.set_main(main);

    let result = analyze(pb.build().unwrap(), &options("1-obj"));
    let call_graph = result.ci_call_graph();
    assert_eq!(call_graph.get_callees(&special).into_iter().collect::<Vec<_>>(), vec![impls[0]]);
    assert_eq!(call_graph.get_callees(&interface).into_iter().collect::<Vec<_>>(), vec![impls[1]]);
    assert_eq!(pts_types(&result, r_special), vec!["R1"]);
    assert_eq!(pts_types(&result, r_itf), vec!["R2"]);
}
