// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Dumping analysis results and comparing them with earlier dumps.
//!
//! Points-to sets are written one pointer per line as
//! `<pointer> -> [<obj1>, <obj2>, ...]`, grouped by pointer category, each
//! group introduced by a header line. Pointers and objects are sorted by
//! their string form, so equal results give byte-identical dumps.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use itertools::Itertools;
use log::*;

use crate::error::{Error, Result};
use crate::pta::cs_manager::PointerCategory;
use crate::pta::result::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;
use crate::util::options::AnalysisOptions;
use crate::util::output_writer;

/// Rendered points-to sets of one category, keyed by pointer.
type CategoryPts = BTreeMap<String, String>;

fn header(category: PointerCategory) -> String {
    format!("---------- Points-to sets of all {} ----------", category.name())
}

/// Renders the non-empty points-to sets of every pointer category.
fn render_pts(result: &PointerAnalysisResult) -> Vec<(PointerCategory, CategoryPts)> {
    let csm = result.cs_manager();
    PointerCategory::ALL
        .iter()
        .map(|category| {
            let mut pts_map = CategoryPts::new();
            for pointer in csm.pointers_of(*category) {
                let pts = result.cs_points_to(*pointer);
                if pts.is_empty() {
                    continue;
                }
                let objs = pts.iter().map(|obj| result.cs_obj_to_string(obj)).sorted().join(", ");
                pts_map.insert(result.pointer_to_string(*pointer), format!("[{}]", objs));
            }
            (*category, pts_map)
        })
        .collect()
}

pub fn dump_pts<W: Write>(result: &PointerAnalysisResult, writer: &mut W) -> std::io::Result<()> {
    for (category, pts_map) in render_pts(result) {
        writeln!(writer, "{}", header(category))?;
        for (pointer, objs) in pts_map {
            writeln!(writer, "{} -> {}", pointer, objs)?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Dumps the call graph, contexts projected away, in DOT format.
pub fn dump_call_graph<W: Write>(result: &PointerAnalysisResult, writer: &mut W) -> std::io::Result<()> {
    let program = result.program();
    result
        .ci_call_graph()
        .to_dot(writer, |method| program.method_sig(method))?;
    writer.flush()
}

/// Parses a points-to dump into `pointer -> object list` entries.
fn parse_dump(dump: &str) -> Result<BTreeMap<String, String>> {
    let mut pts_map = BTreeMap::new();
    for (lineno, line) in dump.lines().enumerate() {
        if line.is_empty() || line.starts_with("----------") {
            continue;
        }
        let (pointer, objs) = line
            .split_once(" -> ")
            .ok_or_else(|| Error::Config(format!("invalid points-to dump line {}: {}", lineno + 1, line)))?;
        pts_map.insert(pointer.to_string(), objs.to_string());
    }
    Ok(pts_map)
}

/// Compares the results with an earlier dump. Every pointer missing on
/// either side and every differing object list counts as a mismatch.
pub fn compare_pts(result: &PointerAnalysisResult, expected_dump: &str) -> Result<()> {
    let expected = parse_dump(expected_dump)?;
    let actual: BTreeMap<String, String> = render_pts(result)
        .into_iter()
        .flat_map(|(_, pts_map)| pts_map)
        .collect();

    let mut mismatches = 0;
    for (pointer, expected_objs) in &expected {
        match actual.get(pointer) {
            None => {
                warn!("Missing pointer {} (expected {})", pointer, expected_objs);
                mismatches += 1;
            }
            Some(objs) if objs != expected_objs => {
                warn!("Mismatched points-to set of {}: expected {}, given {}", pointer, expected_objs, objs);
                mismatches += 1;
            }
            Some(_) => {}
        }
    }
    for (pointer, objs) in &actual {
        if !expected.contains_key(pointer) {
            warn!("Unexpected pointer {} -> {}", pointer, objs);
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        return Err(Error::Compare(mismatches));
    }
    info!("Points-to results match the expected ones");
    Ok(())
}

/// Writes the outputs requested by the options and runs the comparison.
pub fn dump_results(result: &PointerAnalysisResult, options: &AnalysisOptions) -> Result<()> {
    // dump points-to results
    if let Some(pts_output) = &options.pts_output {
        info!("Dumping points-to results...");
        dump_pts(result, &mut output_writer(pts_output)?)?;
    }

    // dump call graph
    if let Some(cg_output) = &options.call_graph_output {
        info!("Dumping call graph...");
        dump_call_graph(result, &mut output_writer(cg_output)?)?;
    }

    if let Some(expected) = &options.compare_pts {
        info!("Comparing points-to results with {}...", expected);
        compare_pts(result, &fs::read_to_string(expected)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_dump_skips_headers() {
        let dump = "---------- Points-to sets of all variables ----------\n\
                    []:<A: void m()>/x -> [[]:NewObj{<A: void m()>[0]new A}]\n\
                    \n\
                    ---------- Points-to sets of all static fields ----------\n";
        let parsed = parse_dump(dump).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["[]:<A: void m()>/x"], "[[]:NewObj{<A: void m()>[0]new A}]");
        assert!(matches!(parse_dump("no arrow here"), Err(Error::Config(_))));
    }
}
