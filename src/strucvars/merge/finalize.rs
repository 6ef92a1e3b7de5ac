//! Finalizer: dedups the accumulated table down to one representative row
//! per (lead × sample), computes allele count/frequency, and re-hydrates
//! the final table directly from the in-memory [`MergedRecord`]s.
//!
//! Ported from the tail of `merge_variants_nr` and `merge_sample_by_support`
//! (`get_disc_class_by_row`/`get_disc_class` are ported as
//! [`crate::strucvars::merge::schema::discovery_class`]). One deliberate
//! deviation: `merge_sample_by_support` re-reads each sample's original
//! table on disk to re-hydrate pass-through columns; every row here is
//! already held in memory as a cloned [`Variant`] inside its `MergedRecord`,
//! so the representative row's own clone is used directly instead of a
//! second disk read.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::strucvars::merge::error::MergeError;
use crate::strucvars::merge::schema::{MergedRecord, SvType};

/// One row of the finalized, re-hydrated merge table.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRow {
    pub chrom: String,
    pub pos: i64,
    pub end: i64,
    pub id: String,
    pub sv_type: SvType,
    pub sv_len: i64,
    pub r#ref: Option<String>,
    pub alt: Option<String>,
    pub extra: IndexMap<String, String>,
    pub merge_src: usize,
    pub merge_src_id: String,
    pub merge_ac: u32,
    pub merge_af: f32,
    pub merge_samples: Vec<usize>,
    pub merge_variants: Vec<String>,
    pub merge_ro: Vec<f64>,
    pub merge_offset: Vec<i64>,
    pub merge_szro: Vec<f64>,
    pub merge_offsz: Vec<f64>,
    pub merge_match: Vec<f64>,
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Finalize the accumulated table: normalize sentinels, keep one
/// representative row per (lead, sample) pair, and group into per-lead
/// summary rows.
pub fn finalize(mut records: Vec<MergedRecord>, n_samples: usize) -> Result<Vec<FinalRow>, MergeError> {
    for r in &mut records {
        r.support_offset = r.support_offset.max(0);
        r.support_ro = r.support_ro.abs();
        r.support_szro = r.support_szro.abs();
        r.support_offsz = r.support_offsz.abs();
        r.support_match = r.support_match.abs();
    }

    records.sort_by(|a, b| {
        a.sample
            .cmp(&b.sample)
            .then_with(|| cmp_f64(b.support_ro, a.support_ro))
            .then_with(|| a.support_offset.cmp(&b.support_offset))
            .then_with(|| cmp_f64(b.support_szro, a.support_szro))
            .then_with(|| cmp_f64(b.support_offsz, a.support_offsz))
            .then_with(|| cmp_f64(b.support_match, a.support_match))
    });

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert((r.support_id.clone(), r.sample, r.support_sample)));

    records.sort_by(|a, b| {
        (&a.support_id, a.sample, a.support_sample).cmp(&(&b.support_id, b.sample, b.support_sample))
    });

    let mut out = Vec::new();
    let mut ids_seen = HashSet::new();

    for (support_id, group) in &records.into_iter().group_by(|r| r.support_id.clone()) {
        let group: Vec<MergedRecord> = group.collect();
        if !ids_seen.insert(support_id.clone()) {
            return Err(MergeError::Invariant(format!("duplicate lead ID after merge: {support_id:?}")));
        }

        let lead = &group[0];
        let merge_ac = group.len() as u32;
        let merge_af = merge_ac as f32 / n_samples as f32;

        out.push(FinalRow {
            chrom: lead.variant.chrom.clone(),
            pos: lead.variant.pos,
            end: lead.variant.end,
            id: support_id,
            sv_type: lead.variant.sv_type,
            sv_len: lead.variant.sv_len,
            r#ref: lead.variant.r#ref.clone(),
            alt: lead.variant.alt.clone(),
            extra: lead.variant.extra.clone(),
            merge_src: lead.support_sample,
            merge_src_id: lead.variant.id.clone(),
            merge_ac,
            merge_af,
            merge_samples: group.iter().map(|r| r.sample).collect(),
            merge_variants: group.iter().map(|r| r.variant.id.clone()).collect(),
            merge_ro: group.iter().map(|r| r.support_ro).collect(),
            merge_offset: group.iter().map(|r| r.support_offset).collect(),
            merge_szro: group.iter().map(|r| r.support_szro).collect(),
            merge_offsz: group.iter().map(|r| r.support_offsz).collect(),
            merge_match: group.iter().map(|r| r.support_match).collect(),
        });
    }

    out.sort_by(|a, b| (&a.chrom, a.pos).cmp(&(&b.chrom, b.pos)));

    Ok(out)
}

/// Relabel each sample's `ID`-keyed annotation rows to the surviving lead's
/// `support_id` and concatenate, subset to leads that made it into the
/// final table. Ported from `svmerge.merge_annotations`.
///
/// `annotations` maps sample index to that sample's annotation rows, keyed
/// by the sample's own (pre-merge) variant ID.
pub fn merge_annotations(
    annotations: &HashMap<usize, HashMap<String, IndexMap<String, String>>>,
    final_rows: &[FinalRow],
) -> Vec<(String, IndexMap<String, String>)> {
    let mut out = Vec::new();
    for row in final_rows {
        if let Some(sample_table) = annotations.get(&row.merge_src) {
            if let Some(fields) = sample_table.get(&row.merge_src_id) {
                out.push((row.id.clone(), fields.clone()));
            }
        }
    }
    out
}
