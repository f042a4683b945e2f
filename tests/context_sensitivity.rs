// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use cspta::ir::builder::ProgramBuilder;
use cspta::ir::call_site::CallKind;
use cspta::ir::program::{Program, VarId};

use common::{analyze, options, pts_types};

/// `r1 = id(new X)` and `r2 = id(new Y)`, where the static `id` returns
/// the result of another static call passing its argument through.
fn nested_identity() -> (Program, VarId, VarId) {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let x = pb.class("X", Some(object));
    let y = pb.class("Y", Some(object));
    let main_class = pb.class("Main", Some(object));
    let object_ty = pb.class_type(object);

    let inner = pb.method(main_class, "inner", &[object_ty], true);
    let inner_p = pb.param(inner, 0);
    pb.ret(inner, Some(inner_p));

    let id = pb.method(main_class, "id", &[object_ty], true);
    let id_p = pb.param(id, 0);
    let id_r = pb.var(id, "r", object_ty);
    let inner_ref = pb.method_ref(inner);
    pb.invoke(id, CallKind::Static, inner_ref, None, &[id_p], Some(id_r));
    pb.ret(id, Some(id_r));

    let main = pb.method(main_class, "main", &[], true);
    let (x_ty, y_ty) = (pb.class_type(x), pb.class_type(y));
    let (ox, oy) = (pb.var(main, "ox", x_ty), pb.var(main, "oy", y_ty));
    let (r1, r2) = (pb.var(main, "r1", object_ty), pb.var(main, "r2", object_ty));
    pb.new_obj(main, ox, x_ty);
    pb.new_obj(main, oy, y_ty);
    let id_ref = pb.method_ref(id);
    pb.invoke(main, CallKind::Static, id_ref.clone(), None, &[ox], Some(r1));
    pb.invoke(main, CallKind::Static, id_ref, None, &[oy], Some(r2));
    pb.set_main(main);
    (pb.build().unwrap(), r1, r2)
}

#[test]
fn call_site_depth_decides_precision() {
    let (program, r1, r2) = nested_identity();
    for (cs, precise) in [("ci", false), ("1-call", false), ("2-call", true), ("1-obj", false), ("2-type", false)] {
        let result = analyze(program.clone(), &options(cs));
        if precise {
            assert_eq!(pts_types(&result, r1), vec!["X"], "{}", cs);
            assert_eq!(pts_types(&result, r2), vec!["Y"], "{}", cs);
        } else {
            assert_eq!(pts_types(&result, r1), vec!["X", "Y"], "{}", cs);
            assert_eq!(pts_types(&result, r2), vec!["X", "Y"], "{}", cs);
        }
    }
}

/// Two boxes allocated in `main`, each filled and read through its own
/// accessor calls.
fn boxes() -> (Program, VarId, VarId) {
    let mut pb = ProgramBuilder::new();
    let object = pb.class("Object", None);
    let boxc = pb.class("Box", Some(object));
    let x = pb.class("X", Some(object));
    let y = pb.class("Y", Some(object));
    let main_class = pb.class("Main", Some(object));
    let object_ty = pb.class_type(object);
    let box_ty = pb.class_type(boxc);
    let item = pb.field(boxc, "item", object_ty, false);

    let set = pb.method(boxc, "set", &[object_ty], false);
    let this = pb.this_var(set).unwrap();
    let v = pb.param(set, 0);
    pb.store_field(set, Some(this), item, v);

    let get = pb.method(boxc, "get", &[], false);
    let this = pb.this_var(get).unwrap();
    let got = pb.var(get, "got", object_ty);
    pb.load_field(get, got, Some(this), item);
    pb.ret(get, Some(got));

    let main = pb.method(main_class, "main", &[], true);
    let (x_ty, y_ty) = (pb.class_type(x), pb.class_type(y));
    let (b1, b2) = (pb.var(main, "b1", box_ty), pb.var(main, "b2", box_ty));
    let (ox, oy) = (pb.var(main, "ox", x_ty), pb.var(main, "oy", y_ty));
    let (r1, r2) = (pb.var(main, "r1", object_ty), pb.var(main, "r2", object_ty));
    pb.new_obj(main, b1, box_ty);
    pb.new_obj(main, b2, box_ty);
    pb.new_obj(main, ox, x_ty);
    pb.new_obj(main, oy, y_ty);
    let (set_ref, get_ref) = (pb.method_ref(set), pb.method_ref(get));
    pb.invoke(main, CallKind::Virtual, set_ref.clone(), Some(b1), &[ox], None);
    pb.invoke(main, CallKind::Virtual, set_ref, Some(b2), &[oy], None);
    pb.invoke(main, CallKind::Virtual, get_ref.clone(), Some(b1), &[], Some(r1));
    pb.invoke(main, CallKind::Virtual, get_ref, Some(b2), &[], Some(r2));
    pb.set_main(main);
    (pb.build().unwrap(), r1, r2)
}

#[test]
fn receivers_separate_accessor_calls() {
    let (program, r1, r2) = boxes();
    for (cs, precise) in [("ci", false), ("1-call", true), ("1-obj", true), ("1-type", false)] {
        let result = analyze(program.clone(), &options(cs));
        if precise {
            assert_eq!(pts_types(&result, r1), vec!["X"], "{}", cs);
            assert_eq!(pts_types(&result, r2), vec!["Y"], "{}", cs);
        } else {
            // One `get` body sees both boxes.
            assert_eq!(pts_types(&result, r1), vec!["X", "Y"], "{}", cs);
            assert_eq!(pts_types(&result, r2), vec!["X", "Y"], "{}", cs);
        }
    }
}

#[test]
fn object_contexts_follow_receivers() {
    let (program, ..) = boxes();
    let result = analyze(program.clone(), &options("1-obj"));
    let csm = result.cs_manager();
    // `set` and `get` each run once per box.
    assert_eq!(result.cs_call_graph().num_funcs(), 5);
    assert_eq!(csm.num_contexts(), 3);

    let result = analyze(program, &options("1-type"));
    assert_eq!(result.cs_call_graph().num_funcs(), 3);
}

#[test]
fn invalid_selectors_are_rejected() {
    let (program, ..) = boxes();
    for cs in ["", "call", "0-obj", "2-site", "k-call"] {
        let err = cspta::pta::analyze_program(std::rc::Rc::new(program.clone()), &options(cs));
        assert!(matches!(err, Err(cspta::Error::Config(_))), "{}", cs);
    }
}
