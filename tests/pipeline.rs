// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Runs the whole pipeline on the JSON programs under `tests/programs`.

use std::fs;
use std::path::PathBuf;

use cspta::error::Error;
use cspta::ir::program::MethodId;
use cspta::pta::run_pointer_analysis;
use cspta::util::bit_vec::Idx;
use cspta::util::options::AnalysisOptions;
use cspta::util::pta_statistics::PTAStat;
use cspta::util::results_dumper::compare_pts;

fn program_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("programs");
    path.push(name);
    path.to_string_lossy().into_owned()
}

fn options_for(name: &str) -> AnalysisOptions {
    let mut options = AnalysisOptions::default();
    options
        .parse_from_args(&[program_path(name)])
        .unwrap();
    options
}

#[test]
fn dump_matches_expected_file() {
    let dir = tempfile::tempdir().unwrap();
    let pts_output = dir.path().join("dispatch.pts");
    let cg_output = dir.path().join("dispatch.dot");

    let mut options = options_for("dispatch.json");
    options
        .parse_from_args(&[
            "--dump-pts".to_string(),
            pts_output.to_string_lossy().into_owned(),
            "--dump-call-graph".to_string(),
            cg_output.to_string_lossy().into_owned(),
            "--compare-pts".to_string(),
            program_path("dispatch.pts"),
        ])
        .unwrap();
    let result = run_pointer_analysis(&options).unwrap();

    let dumped = fs::read_to_string(&pts_output).unwrap();
    let expected = fs::read_to_string(program_path("dispatch.pts")).unwrap();
    assert_eq!(dumped, expected);

    let dot = fs::read_to_string(&cg_output).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("label = \"<A: foo()>\""));
    assert!(dot.contains("label = \"<B: foo()>\""));
    assert!(dot.contains("label = \"Virtual\""));

    let stat = PTAStat::new(&result);
    assert_eq!(stat.cs.pointers, 5);
    assert_eq!(stat.cs.relations, 7);
    assert_eq!(stat.ci, stat.cs);
    assert_eq!(stat.call_graph.num_ci_reach_methods, 3);
    assert_eq!(stat.call_graph.num_ci_call_edges, 2);
    let mut report = Vec::new();
    stat.dump_pts_stat(&mut report).unwrap();
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("#Points-to relations: 7"));

    let ci_call_graph = result.ci_call_graph();
    let main = MethodId::new(0);
    assert_eq!(ci_call_graph.get_callees_of_func(main).len(), 2);
}

#[test]
fn comparison_reports_every_mismatch() {
    let options = options_for("dispatch.json");
    let result = run_pointer_analysis(&options).unwrap();
    let expected = fs::read_to_string(program_path("dispatch.pts")).unwrap();
    assert!(compare_pts(&result, &expected).is_ok());

    // One pointer missing from the expectation, one with a different set
    // and one that the analysis never produced.
    let edited = expected
        .lines()
        .filter(|line| !line.starts_with("[]:<B: foo()>/this"))
        .map(|line| {
            if line.starts_with("[]:<A: foo()>/o") {
                "[]:<A: foo()>/o -> []".to_string()
            } else {
                line.to_string()
            }
        })
        .chain(std::iter::once("[]:<C: bar()>/x -> []".to_string()))
        .collect::<Vec<_>>()
        .join("\n");
    match compare_pts(&result, &edited) {
        Err(Error::Compare(mismatches)) => assert_eq!(mismatches, 3),
        other => panic!("unexpected comparison result {:?}", other),
    }
}

#[test]
fn context_sensitive_dump_names_contexts() {
    let mut options = options_for("dispatch.json");
    options.parse_from_args(&["--cs".to_string(), "1-obj".to_string()]).unwrap();
    let result = run_pointer_analysis(&options).unwrap();
    assert_eq!(result.context_sensitivity(), "1-obj");

    let mut dump = Vec::new();
    cspta::util::results_dumper::dump_pts(&result, &mut dump).unwrap();
    let dump = String::from_utf8(dump).unwrap();
    assert!(dump.contains("[NewObj{<Main: main()>[1]new B}]:<B: foo()>/this -> "));
    assert!(dump.contains("[NewObj{<Main: main()>[0]new A}]:<A: foo()>/o -> "));
}

#[test]
fn bad_inputs_are_reported() {
    let missing = AnalysisOptions::default();
    assert!(matches!(run_pointer_analysis(&missing), Err(Error::Config(_))));

    let mut options = options_for("dispatch.json");
    options.context_sensitivity = "0-call".to_string();
    assert!(matches!(run_pointer_analysis(&options), Err(Error::Config(_))));

    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ \"types\": [] ").unwrap();
    let mut options = AnalysisOptions::default();
    options.input = Some(broken.to_string_lossy().into_owned());
    assert!(matches!(run_pointer_analysis(&options), Err(Error::Json(_))));

    // `main` calls the undeclared static `Main.missing()`.
    let unresolved = dir.path().join("unresolved.json");
    fs::write(
        &unresolved,
        r#"{
            "types": [{"name": "Main", "kind": {"Class": 0}}],
            "classes": [{"name": "Main", "ty": 0, "methods": [0]}],
            "methods": [{"name": "main", "subsignature": "main()", "class": 0, "is_static": true,
                         "body": [{"op": "Invoke", "call_site": 0}]}],
            "call_sites": [{"container": 0, "kind": "Static",
                            "method_ref": {"class": 0, "subsignature": "missing()"}}],
            "main_method": 0
        }"#,
    )
    .unwrap();
    options.input = Some(unresolved.to_string_lossy().into_owned());
    assert!(matches!(run_pointer_analysis(&options), Err(Error::MalformedIr(_))));
}
