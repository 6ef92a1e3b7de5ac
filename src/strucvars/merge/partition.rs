//! Interval partitioner: bounds the overlap resolver's combinatorial cost
//! by splitting a chromosome's surviving rows into independent packets.
//!
//! Ported from `svmerge.get_support_table`'s per-chromosome interval-tree
//! coalescing loop, using [`crate::strucvars::merge::itree::IntervalTree`]
//! since the corpus's `bio::data_structures::interval_tree` has no removal.

use std::collections::HashSet;

use crate::strucvars::merge::itree::IntervalTree;
use crate::strucvars::merge::schema::{SvType, Variant};

/// An independent unit of pairwise resolution: the source/target variant
/// IDs (within one chromosome) that must be compared against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub source_ids: Vec<String>,
    pub target_ids: Vec<String>,
}

/// Inflated interval bounds for one row: INS uses `[pos, pos+svlen)` as its
/// footprint (wider than the point footprint the matcher/resolver otherwise
/// treat INS as having) so it can reach overlapping INS candidates during
/// partitioning.
fn effective_end(v: &Variant) -> i64 {
    if v.sv_type == SvType::Ins {
        v.pos + v.sv_len
    } else {
        v.end
    }
}

/// Partition one chromosome's `base` (already-merged) and `next` (new
/// sample) rows into independent packets. `offset_max` is the configured
/// maximum breakpoint offset (`None` means no offset gate is active, in
/// which case a minimal flank of 1 is used).
pub fn partition_chromosome(base: &[&Variant], next: &[&Variant], offset_max: Option<u32>) -> Vec<Packet> {
    let flank = offset_max.map(|o| o as i64 + 1).unwrap_or(1);

    let mut tree: IntervalTree<(HashSet<String>, HashSet<String>)> = IntervalTree::new();

    for v in base {
        let start = v.pos - flank;
        let end = effective_end(v) + flank;
        let mut sources = HashSet::new();
        sources.insert(v.id.clone());
        tree.insert(start, end, (sources, HashSet::new()));
    }

    for v in next {
        let pos = v.pos;
        let end = effective_end(v);

        let mut source_rows = HashSet::new();
        let mut target_rows = HashSet::new();
        target_rows.insert(v.id.clone());

        let mut min_start = None;
        let mut max_end = None;

        for key in tree.query_overlapping(pos, end) {
            let (s, e, (sources, targets)) = tree.remove(key);
            min_start = Some(min_start.map_or(s, |m: i64| m.min(s)));
            max_end = Some(max_end.map_or(e, |m: i64| m.max(e)));
            source_rows.extend(sources);
            target_rows.extend(targets);
        }

        if !source_rows.is_empty() {
            let start = min_start.unwrap();
            let new_end = max_end.unwrap();
            tree.insert(start, new_end, (source_rows, target_rows));
        }
    }

    tree.drain()
        .into_iter()
        .filter_map(|(_, _, (sources, targets))| {
            if targets.is_empty() {
                None
            } else {
                let mut source_ids: Vec<String> = sources.into_iter().collect();
                let mut target_ids: Vec<String> = targets.into_iter().collect();
                source_ids.sort_unstable();
                target_ids.sort_unstable();
                Some(Packet { source_ids, target_ids })
            }
        })
        .collect()
}
