//! Overlap resolver: per-packet pairwise metrics, phase gating, and
//! nearest-by-priority greedy matching.
//!
//! Ported from the metric/gating definitions in `svmerge.get_support_table`
//! (the `nearest_by_svlen_overlap` call it dispatches to per packet isn't
//! present in the retrieved source, so the nearest-selection greedy sweep
//! below is written directly from the priority-tuple description of how
//! candidates are ranked). Packets are resolved in parallel with `rayon`,
//! via a scoped `ThreadPoolBuilder`/`pool.install` call.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::strucvars::merge::align::{match_proportion, SequenceAligner};
use crate::strucvars::merge::error::MergeError;
use crate::strucvars::merge::params::AlignParams;
use crate::strucvars::merge::partition::Packet;
use crate::strucvars::merge::schema::{SupportRow, Variant};

/// Gating thresholds and flags for one resolver phase. The RO phase sets
/// `ro_min` only; the size+offset phase sets `offset_max`/`szro_min` only;
/// a field left `None` is simply not checked, so one `resolve_packet` covers
/// both phases (they differ only in which thresholds are active).
pub struct PhaseParams<'a> {
    pub ro_min: Option<f64>,
    pub offset_max: Option<u32>,
    pub szro_min: Option<f64>,
    pub match_ref: bool,
    pub match_alt: bool,
    pub align: Option<(&'a dyn SequenceAligner, &'a AlignParams)>,
}

struct Metrics {
    offset: i64,
    ro: f64,
    szro: f64,
    offsz: f64,
    r#match: Option<f64>,
}

fn compute_metrics(source: &Variant, target: &Variant, phase: &PhaseParams) -> Metrics {
    let offset = (source.pos - target.pos).abs().min((source.end - target.end).abs());

    let len_s = (source.end - source.pos).max(0);
    let len_t = (target.end - target.pos).max(0);
    let overlap = (source.end.min(target.end) - source.pos.max(target.pos)).max(0);
    let ro = if len_s.max(len_t) == 0 {
        0.0
    } else {
        overlap as f64 / len_s.max(len_t) as f64
    };

    let max_svlen = source.sv_len.max(target.sv_len);
    let szro = if max_svlen == 0 {
        0.0
    } else {
        source.sv_len.min(target.sv_len) as f64 / max_svlen as f64
    };
    let offsz = if max_svlen == 0 { 0.0 } else { offset as f64 / max_svlen as f64 };

    let r#match = phase.align.map(|(aligner, params)| match (&source.seq, &target.seq) {
        (Some(a), Some(b)) => match_proportion(aligner, a, b, params),
        _ => 0.0,
    });

    Metrics {
        offset,
        ro,
        szro,
        offsz,
        r#match,
    }
}

/// Evaluate one candidate pair against the phase's gates; `None` if rejected.
fn candidate(source: &Variant, target: &Variant, phase: &PhaseParams) -> Option<SupportRow> {
    if phase.match_ref && source.r#ref != target.r#ref {
        return None;
    }
    if phase.match_alt && source.alt != target.alt {
        return None;
    }

    let m = compute_metrics(source, target, phase);

    if let Some(ro_min) = phase.ro_min {
        if m.ro < ro_min {
            return None;
        }
    }
    if let Some(offset_max) = phase.offset_max {
        if m.offset > offset_max as i64 {
            return None;
        }
    }
    if let Some(szro_min) = phase.szro_min {
        if m.szro < szro_min {
            return None;
        }
    }
    if let Some((_, align_params)) = phase.align {
        if m.r#match.unwrap_or(0.0) < align_params.score_prop {
            return None;
        }
    }

    Some(SupportRow {
        id: source.id.clone(),
        target_id: target.id.clone(),
        offset: m.offset,
        ro: m.ro,
        szro: m.szro,
        offsz: m.offsz,
        r#match: m.r#match,
    })
}

/// Total order over candidate rows: higher `ro`, lower `offset`, higher
/// `szro`, higher `match`, then `id`/`target_id` ascending as deterministic
/// tie-breakers.
fn priority_cmp(a: &SupportRow, b: &SupportRow) -> Ordering {
    b.ro.partial_cmp(&a.ro)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.offset.cmp(&b.offset))
        .then_with(|| b.szro.partial_cmp(&a.szro).unwrap_or(Ordering::Equal))
        .then_with(|| {
            b.r#match
                .unwrap_or(-1.0)
                .partial_cmp(&a.r#match.unwrap_or(-1.0))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.target_id.cmp(&b.target_id))
}

/// Resolve one packet: every candidate pair is gated, then a greedy sweep in
/// priority order keeps a candidate only if neither its source nor target ID
/// has already been claimed (so each ID appears at most once in the output).
pub fn resolve_packet(
    packet: &Packet,
    sources: &HashMap<&str, &Variant>,
    targets: &HashMap<&str, &Variant>,
    phase: &PhaseParams,
) -> Result<Vec<SupportRow>, MergeError> {
    let mut candidates = Vec::new();

    for source_id in &packet.source_ids {
        let source = sources.get(source_id.as_str()).ok_or_else(|| MergeError::Runtime {
            chrom: source_id.clone(),
            message: format!("packet references unknown source ID {source_id:?}"),
        })?;
        for target_id in &packet.target_ids {
            let target = targets.get(target_id.as_str()).ok_or_else(|| MergeError::Runtime {
                chrom: target_id.clone(),
                message: format!("packet references unknown target ID {target_id:?}"),
            })?;
            if let Some(row) = candidate(source, target, phase) {
                candidates.push(row);
            }
        }
    }

    candidates.sort_by(priority_cmp);

    let mut used_sources = HashSet::new();
    let mut used_targets = HashSet::new();
    let mut out = Vec::new();

    for row in candidates {
        if used_sources.contains(&row.id) || used_targets.contains(&row.target_id) {
            continue;
        }
        used_sources.insert(row.id.clone());
        used_targets.insert(row.target_id.clone());
        out.push(row);
    }

    Ok(out)
}

/// Resolve every packet in parallel on a scoped `rayon` pool and flatten the
/// results. `sources`/`targets` index the full (not per-packet) row sets by
/// ID; each packet looks up only the rows named in its own ID lists.
pub fn resolve_packets(
    packets: &[Packet],
    sources: &[Variant],
    targets: &[Variant],
    phase: &PhaseParams,
    threads: usize,
) -> Result<Vec<SupportRow>, MergeError> {
    let source_index: HashMap<&str, &Variant> = sources.iter().map(|v| (v.id.as_str(), v)).collect();
    let target_index: HashMap<&str, &Variant> = targets.iter().map(|v| (v.id.as_str(), v)).collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| MergeError::Runtime {
            chrom: String::new(),
            message: format!("could not build resolver thread pool: {e}"),
        })?;

    let results: Vec<Result<Vec<SupportRow>, MergeError>> = pool.install(|| {
        packets
            .par_iter()
            .map(|packet| resolve_packet(packet, &source_index, &target_index, phase))
            .collect()
    });

    let mut out = Vec::new();
    for r in results {
        out.extend(r?);
    }
    Ok(out)
}
