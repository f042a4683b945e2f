// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufWriter, Write};

use log::*;

use crate::ir::program::{FieldId, VarId};
use crate::pta::cs_manager::{Pointer, PointerCategory};
use crate::pta::heap_model::ObjId;
use crate::pta::result::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;
use crate::util::call_graph_stat::CallGraphStat;

/// A pointer with its contexts projected away.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum CIPointer {
    Var(VarId),
    InstanceField(ObjId, FieldId),
    StaticField(FieldId),
    ArrayIndex(ObjId),
}

/// Number of pointers and points-to relations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PtsCount {
    pub pointers: usize,
    pub relations: usize,
}

impl PtsCount {
    pub fn avg_size(&self) -> f64 {
        if self.pointers == 0 {
            0.0
        } else {
            self.relations as f64 / self.pointers as f64
        }
    }

    fn dump<W: Write>(&self, stat_writer: &mut W) -> std::io::Result<()> {
        writeln!(stat_writer, "#Pointers: {}", self.pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", self.relations)?;
        writeln!(stat_writer, "#Avg points-to size: {}", self.avg_size())
    }
}

/// Points-to figures of one analysis run, over pointers with a non-empty
/// points-to set.
#[derive(Debug, Default)]
pub struct PTAStat {
    pub cs: PtsCount,
    pub ci: PtsCount,
    pub cs_by_category: BTreeMap<&'static str, PtsCount>,
    pub call_graph: CallGraphStat,
}

impl PTAStat {
    pub fn new(result: &PointerAnalysisResult) -> Self {
        let csm = result.cs_manager();
        let mut cs = PtsCount::default();
        let mut cs_by_category: BTreeMap<&'static str, PtsCount> = PointerCategory::ALL
            .iter()
            .map(|category| (category.name(), PtsCount::default()))
            .collect();
        let mut ci_pts_map: HashMap<CIPointer, HashSet<ObjId>> = HashMap::new();

        for (pointer, pts) in result.pointers() {
            let count = pts.count();
            cs.pointers += 1;
            cs.relations += count;
            let cs_pointer = csm.pointer(pointer);
            let category_count = cs_by_category.entry(cs_pointer.category().name()).or_default();
            category_count.pointers += 1;
            category_count.relations += count;

            let ci_pointer = match *cs_pointer {
                Pointer::Var { var, .. } => CIPointer::Var(var),
                Pointer::InstanceField { obj, field } => CIPointer::InstanceField(csm.cs_obj(obj).obj, field),
                Pointer::StaticField { field } => CIPointer::StaticField(field),
                Pointer::ArrayIndex { obj } => CIPointer::ArrayIndex(csm.cs_obj(obj).obj),
            };
            ci_pts_map
                .entry(ci_pointer)
                .or_default()
                .extend(pts.iter().map(|obj| csm.cs_obj(obj).obj));
        }

        let ci = PtsCount {
            pointers: ci_pts_map.len(),
            relations: ci_pts_map.values().map(HashSet::len).sum(),
        };

        PTAStat {
            cs,
            ci,
            cs_by_category,
            call_graph: CallGraphStat::new(result),
        }
    }

    /// Prints the statistics to standard output.
    pub fn dump_stats(&self) -> std::io::Result<()> {
        let mut stat_writer = BufWriter::new(Box::new(std::io::stdout()) as Box<dyn Write>);

        info!("Dumping pta statistics...");
        writeln!(stat_writer, "##########################################################")?;
        self.call_graph.dump(&mut stat_writer)?;
        writeln!(stat_writer, "----------------------------------------------------------")?;
        self.dump_pts_stat(&mut stat_writer)?;
        writeln!(stat_writer, "##########################################################")?;
        stat_writer.flush()
    }

    pub fn dump_pts_stat<W: Write>(&self, stat_writer: &mut W) -> std::io::Result<()> {
        writeln!(stat_writer, "CS Points-to Statistics: ")?;
        self.cs.dump(stat_writer)?;
        for (category, count) in &self.cs_by_category {
            writeln!(
                stat_writer,
                "\t#{}: {}, #points-to relations: {}",
                category, count.pointers, count.relations
            )?;
        }
        writeln!(stat_writer, "CI Points-to Statistics: ")?;
        self.ci.dump(stat_writer)
    }
}
