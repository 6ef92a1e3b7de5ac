//! Incremental accumulator: folds one sample's support table into the
//! running merged table `M`, per sample, in strict sequence.
//!
//! Ported from `merge_variants_nr`'s per-sample loop body. The nested
//! `nearest_by_svlen_overlap` dispatch isn't present in the retrieved
//! source, so the phase sequencing (exact → RO → size+offset, each
//! narrowing the still-unmatched target rows) is written directly,
//! reusing [`exact::exact_match`], [`partition::partition_chromosome`]
//! and [`resolve::resolve_packets`] already ported from the adjacent
//! functions that *are* in the retrieved source.

use std::collections::{HashMap, HashSet};

use crate::strucvars::merge::align::SequenceAligner;
use crate::strucvars::merge::error::MergeError;
use crate::strucvars::merge::exact::exact_match;
use crate::strucvars::merge::loader::SampleTable;
use crate::strucvars::merge::params::MergeParams;
use crate::strucvars::merge::partition::{partition_chromosome, Packet};
use crate::strucvars::merge::resolve::{resolve_packets, PhaseParams};
use crate::strucvars::merge::schema::{MergedRecord, SupportRow, Variant};
use crate::strucvars::merge::version_id::version_id;

/// `M` (running merged table) plus `B` (side list of support rows admitted
/// while `expand` is off, appended back into `M` only at [`Accumulator::finish`]).
pub struct Accumulator {
    records: Vec<MergedRecord>,
    side: Vec<MergedRecord>,
    /// Every `support_id` (merged-callset lead identifier) assigned so far,
    /// across all samples folded. A new lead's `support_id` is checked
    /// against this set to stay globally unique; a row's own contributed
    /// variant ID is never touched, so `MERGE_VARIANTS` always shows each
    /// sample's ID as it appears in that sample's table.
    all_ids: HashSet<String>,
}

fn sort_key(v: &Variant) -> (&str, i64, i64, &str) {
    (&v.chrom, v.pos, v.sv_len, &v.id)
}

impl Accumulator {
    /// Seed `M` from the first sample: every row is its own lead.
    pub fn new(sample_index: usize, rows: Vec<Variant>) -> Self {
        let all_ids = rows.iter().map(|v| v.id.clone()).collect();
        let records = rows
            .into_iter()
            .map(|v| {
                let support_id = v.id.clone();
                MergedRecord {
                    variant: v,
                    sample: sample_index,
                    support_id,
                    support_sample: sample_index,
                    support_offset: -1,
                    support_ro: -1.0,
                    support_szro: -1.0,
                    support_offsz: -1.0,
                    support_match: -1.0,
                }
            })
            .collect();
        Self {
            records,
            side: Vec::new(),
            all_ids,
        }
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    /// Fold sample `sample_index`'s table into the running merge.
    pub fn fold_sample(
        &mut self,
        sample_index: usize,
        sample: &SampleTable,
        params: &MergeParams,
        aligner: &dyn SequenceAligner,
        threads: usize,
    ) -> Result<(), MergeError> {
        let base_variants: Vec<Variant> = self.records.iter().map(|r| r.variant.clone()).collect();

        let id_to_lead: HashMap<String, (usize, String)> = self
            .records
            .iter()
            .map(|r| (r.variant.id.clone(), (r.support_sample, r.support_id.clone())))
            .collect();

        let sample_by_id: HashMap<&str, &Variant> =
            sample.rows.iter().map(|v| (v.id.as_str(), v)).collect();

        let mut remaining: Vec<Variant> = sample.rows.clone();
        let mut support_rows: Vec<SupportRow> = Vec::new();

        // Phase 1: exact key match.
        let exact_rows = exact_match(&base_variants, &remaining, params.match_ref, params.match_alt, params.match_seq());
        let matched: HashSet<&str> = exact_rows.iter().map(|r| r.target_id.as_str()).collect();
        remaining.retain(|v| !matched.contains(v.id.as_str()));
        support_rows.extend(exact_rows);

        let align = params.align.as_ref().map(|p| (aligner, p));

        // Phase 2: reciprocal overlap.
        if !remaining.is_empty() {
            if let Some(ro_min) = params.ro_min {
                let packets = partition_all_chromosomes(&base_variants, &remaining, None);
                let phase = PhaseParams {
                    ro_min: Some(ro_min),
                    offset_max: None,
                    szro_min: None,
                    match_ref: params.match_ref,
                    match_alt: params.match_alt,
                    align,
                };
                let ro_rows = resolve_packets(&packets, &base_variants, &remaining, &phase, threads)?;
                let matched: HashSet<&str> = ro_rows.iter().map(|r| r.target_id.as_str()).collect();
                remaining.retain(|v| !matched.contains(v.id.as_str()));
                support_rows.extend(ro_rows);
            }
        }

        // Phase 3: size overlap with bounded breakpoint offset.
        if !remaining.is_empty() {
            if let (Some(szro_min), Some(offset_max)) = (params.szro_min, params.offset_max) {
                let packets = partition_all_chromosomes(&base_variants, &remaining, Some(offset_max));
                let phase = PhaseParams {
                    ro_min: None,
                    offset_max: Some(offset_max),
                    szro_min: Some(szro_min),
                    match_ref: params.match_ref,
                    match_alt: params.match_alt,
                    align,
                };
                let offset_rows = resolve_packets(&packets, &base_variants, &remaining, &phase, threads)?;
                let matched: HashSet<&str> = offset_rows.iter().map(|r| r.target_id.as_str()).collect();
                remaining.retain(|v| !matched.contains(v.id.as_str()));
                support_rows.extend(offset_rows);
            }
        }

        // Deduplicate T: first record per new (target) ID, priority order.
        support_rows.sort_by(|a, b| {
            b.ro.partial_cmp(&a.ro)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.offset.cmp(&b.offset))
                .then_with(|| b.szro.partial_cmp(&a.szro).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| {
                    b.r#match
                        .unwrap_or(-1.0)
                        .partial_cmp(&a.r#match.unwrap_or(-1.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        let mut seen_targets = HashSet::new();
        support_rows.retain(|row| seen_targets.insert(row.target_id.clone()));

        // Build candidate MergedRecords for admitted support rows, inheriting
        // the matched base row's (sample, support_id).
        let mut admitted = Vec::with_capacity(support_rows.len());
        for row in &support_rows {
            let (lead_sample, lead_support_id) = id_to_lead.get(&row.id).ok_or_else(|| MergeError::Invariant(format!(
                "support row references base ID {:?} not present in the running merge",
                row.id
            )))?;
            let target_variant = sample_by_id
                .get(row.target_id.as_str())
                .ok_or_else(|| MergeError::Invariant(format!("support row references unknown target ID {:?}", row.target_id)))?;
            admitted.push(MergedRecord {
                variant: (*target_variant).clone(),
                sample: sample_index,
                support_id: lead_support_id.clone(),
                support_sample: *lead_sample,
                support_offset: row.offset,
                support_ro: row.ro,
                support_szro: row.szro,
                support_offsz: row.offsz,
                support_match: row.r#match.unwrap_or(-1.0),
            });
        }

        // Unmatched rows of S become new leads.
        let mut new_leads: Vec<MergedRecord> = remaining
            .into_iter()
            .map(|v| {
                let support_id = v.id.clone();
                MergedRecord {
                    variant: v,
                    sample: sample_index,
                    support_id,
                    support_sample: sample_index,
                    support_offset: -1,
                    support_ro: -1.0,
                    support_szro: -1.0,
                    support_offsz: -1.0,
                    support_match: -1.0,
                }
            })
            .collect();

        // Version only new leads' support_id against every lead identifier
        // used so far. Admitted support rows keep the lead's already-unique
        // support_id unchanged, and no row's own variant ID is ever
        // rewritten: MERGE_VARIANTS must show each sample's contributed ID
        // exactly as that sample's table spells it.
        let new_lead_ids: Vec<String> = new_leads.iter().map(|r| r.support_id.clone()).collect();
        let versioned = version_id(&new_lead_ids, &self.all_ids)?;
        for (record, new_id) in new_leads.iter_mut().zip(versioned.iter()) {
            record.support_id = new_id.clone();
        }
        self.all_ids.extend(versioned);

        if params.expand_base {
            self.records.extend(admitted);
        } else {
            self.side.extend(admitted);
        }
        self.records.extend(new_leads);

        self.records.sort_by(|a, b| sort_key(&a.variant).cmp(&sort_key(&b.variant)));

        Ok(())
    }

    /// Append the side list (support rows admitted while `expand` was off)
    /// into the running table and return the final unsorted row set.
    pub fn finish(mut self) -> Vec<MergedRecord> {
        self.records.extend(self.side);
        self.records
    }
}

fn partition_all_chromosomes(base: &[Variant], next: &[Variant], offset_max: Option<u32>) -> Vec<Packet> {
    let mut chroms: Vec<&str> = base.iter().map(|v| v.chrom.as_str()).collect();
    chroms.extend(next.iter().map(|v| v.chrom.as_str()));
    chroms.sort_unstable();
    chroms.dedup();

    let mut packets = Vec::new();
    for chrom in chroms {
        let base_chrom: Vec<&Variant> = base.iter().filter(|v| v.chrom == chrom).collect();
        let next_chrom: Vec<&Variant> = next.iter().filter(|v| v.chrom == chrom).collect();
        if base_chrom.is_empty() || next_chrom.is_empty() {
            continue;
        }
        packets.extend(partition_chromosome(&base_chrom, &next_chrom, offset_max));
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strucvars::merge::align::GotohAligner;
    use crate::strucvars::merge::finalize::finalize;
    use crate::strucvars::merge::schema::SvType;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn v(id: &str, chrom: &str, pos: i64, end: i64, sv_len: i64) -> Variant {
        Variant {
            chrom: chrom.to_string(),
            pos,
            end,
            id: id.to_string(),
            sv_type: SvType::Del,
            sv_len,
            r#ref: None,
            alt: None,
            seq: None,
            extra: IndexMap::new(),
        }
    }

    fn sample(name: &str, rows: Vec<Variant>) -> SampleTable {
        SampleTable {
            sample: name.to_string(),
            rows,
        }
    }

    #[test]
    fn exact_match_inherits_lead_identity() {
        let mut acc = Accumulator::new(0, vec![v("a1", "chr1", 100, 110, 10)]);
        let params = MergeParams::default();
        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);
        let s2 = sample("s2", vec![v("b1", "chr1", 100, 110, 10)]);

        acc.fold_sample(1, &s2, &params, &aligner, 1).unwrap();
        let records = acc.finish();

        assert_eq!(records.len(), 2);
        let support = records.iter().find(|r| r.sample == 1).unwrap();
        assert_eq!(support.support_id, "a1");
        assert_eq!(support.support_sample, 0);
        assert!(!support.is_primary());
    }

    #[test]
    fn ro_phase_merges_overlapping_calls_and_new_lead_is_created_otherwise() {
        let mut acc = Accumulator::new(0, vec![v("a1", "chr1", 100, 200, 100)]);
        let mut params = MergeParams::default();
        params.ro_min = Some(0.5);
        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);

        let s2 = sample(
            "s2",
            vec![
                v("b1", "chr1", 140, 240, 100),
                v("b2", "chr1", 5000, 5100, 100),
            ],
        );
        acc.fold_sample(1, &s2, &params, &aligner, 1).unwrap();
        let records = acc.finish();

        assert_eq!(records.len(), 3);
        let merged = records.iter().find(|r| r.variant.id == "b1").unwrap();
        assert_eq!(merged.support_id, "a1");
        let new_lead = records.iter().find(|r| r.variant.id == "b2").unwrap();
        assert!(new_lead.is_primary());
    }

    #[test]
    fn colliding_new_lead_ids_get_versioned() {
        let mut acc = Accumulator::new(0, vec![v("dup", "chr1", 100, 110, 10)]);
        let params = MergeParams::default();
        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);

        let s2 = sample("s2", vec![v("dup", "chr1", 9000, 9010, 10)]);
        acc.fold_sample(1, &s2, &params, &aligner, 1).unwrap();
        let records = acc.finish();

        // The two "dup" calls don't overlap (chr1:100 vs chr1:9000), so the
        // second becomes its own new lead. Its support_id is versioned to
        // stay globally unique, but its own variant ID is untouched.
        let support_ids: HashSet<&str> = records.iter().map(|r| r.support_id.as_str()).collect();
        assert_eq!(support_ids.len(), records.len());
        assert!(support_ids.contains("dup.1"));

        let variant_ids: Vec<&str> = records.iter().map(|r| r.variant.id.as_str()).collect();
        assert_eq!(variant_ids.iter().filter(|&&id| id == "dup").count(), 2);
    }

    /// Two samples contribute the literal same ID for a matching call
    /// (S1). The second sample's row must keep its own original ID in the
    /// output, not the versioned lead identifier.
    #[test]
    fn exact_match_keeps_each_samples_own_contributed_id() {
        let mut acc = Accumulator::new(0, vec![v("v1", "chr1", 100, 110, 10)]);
        let params = MergeParams::default();
        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);

        let s2 = sample("s2", vec![v("v1", "chr1", 100, 110, 10)]);
        acc.fold_sample(1, &s2, &params, &aligner, 1).unwrap();
        let rows = finalize(acc.finish(), 2).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].merge_variants, vec!["v1".to_string(), "v1".to_string()]);
    }

    /// A<->B overlap at ro=0.55, B<->C overlap at ro=0.55, but
    /// A<->C only overlap at ro=0.1 (below the `ro=50` threshold). Without
    /// `expand`, C can only ever be compared against the original leads, so
    /// it forms its own lead; with `expand`, B became searchable once
    /// admitted, so C matches through B into A's group.
    #[test]
    fn expand_lets_a_chain_of_overlaps_merge_into_one_lead() {
        let a = v("a", "chr1", 100, 200, 100);
        let b = v("b", "chr1", 145, 245, 100);
        let c = v("c", "chr1", 190, 290, 100);

        let mut params = MergeParams::default();
        params.ro_min = Some(0.5);
        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);

        // Without expand: B supports A, C cannot see B and becomes a new lead.
        let mut acc = Accumulator::new(0, vec![a.clone()]);
        acc.fold_sample(1, &sample("s2", vec![b.clone()]), &params, &aligner, 1)
            .unwrap();
        acc.fold_sample(2, &sample("s3", vec![c.clone()]), &params, &aligner, 1)
            .unwrap();
        let rows = finalize(acc.finish(), 3).unwrap();
        let mut acs: Vec<u32> = rows.iter().map(|r| r.merge_ac).collect();
        acs.sort_unstable();
        assert_eq!(acs, vec![1, 2]);

        // With expand: the same three calls fold into a single lead.
        params.expand_base = true;
        let mut acc = Accumulator::new(0, vec![a]);
        acc.fold_sample(1, &sample("s2", vec![b]), &params, &aligner, 1).unwrap();
        acc.fold_sample(2, &sample("s3", vec![c]), &params, &aligner, 1).unwrap();
        let rows = finalize(acc.finish(), 3).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].merge_ac, 3);
    }

    /// Two INS calls at the same position/length but with
    /// divergent sequences merge when no `match=` gate is active (the exact
    /// matcher's key ignores sequence), but stay separate leads once
    /// sequence-alignment gating is turned on.
    #[test]
    fn sequence_gating_prevents_a_merge_that_coordinates_alone_would_allow() {
        let mut ins_a = v("a", "chr1", 100, 101, 10);
        ins_a.sv_type = SvType::Ins;
        ins_a.seq = Some(b"ACGTACGTAC".to_vec());
        let mut ins_b = v("b", "chr1", 100, 101, 10);
        ins_b.sv_type = SvType::Ins;
        ins_b.seq = Some(b"ACGTTTTTAC".to_vec());

        let aligner = GotohAligner::new(2.0, -1.0, -5.0, -0.5);

        let params_no_match = MergeParams::default();
        let mut acc = Accumulator::new(0, vec![ins_a.clone()]);
        acc.fold_sample(1, &sample("s2", vec![ins_b.clone()]), &params_no_match, &aligner, 1)
            .unwrap();
        let rows = finalize(acc.finish(), 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].merge_ac, 2);

        let mut params_match = MergeParams::default();
        params_match.align = Some(crate::strucvars::merge::params::AlignParams {
            score_prop: 0.9,
            ..Default::default()
        });
        let mut acc = Accumulator::new(0, vec![ins_a]);
        acc.fold_sample(1, &sample("s2", vec![ins_b]), &params_match, &aligner, 1)
            .unwrap();
        let rows = finalize(acc.finish(), 2).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
