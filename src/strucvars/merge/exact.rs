//! Exact-key matcher: the first merge phase.
//!
//! Ported from `svmerge.get_support_table_exact`'s two-pointer merge-join
//! on a composite sort key. The loader leaves `base`/`next` sorted by
//! `(chrom, pos, svlen, id)`, which is not the join order: when REF/ALT/SEQ
//! matching is enabled the rows must be re-sorted by the composite key
//! `(chrom, pos, svlen, [ref], [alt], [seq])` first, same as the original's
//! `sort_values(sort_cols)` immediately before its sweep.

use crate::strucvars::merge::schema::{SupportRow, Variant};

fn key(v: &Variant, match_ref: bool, match_alt: bool, match_seq: bool) -> (&str, i64, i64, Option<&str>, Option<&str>, Option<&[u8]>) {
    (
        v.chrom.as_str(),
        v.pos,
        v.sv_len,
        if match_ref { Some(v.r#ref.as_deref().unwrap_or("")) } else { None },
        if match_alt { Some(v.alt.as_deref().unwrap_or("")) } else { None },
        if match_seq { Some(v.seq.as_deref().unwrap_or(b"")) } else { None },
    )
}

/// Linear merge-join producing one [`SupportRow`] per exact key match.
/// `base`/`next` are re-sorted internally by the composite join key before
/// the sweep, since the loader's `(chrom, pos, svlen, id)` order only
/// coincides with the join order when REF/ALT/SEQ matching is off.
pub fn exact_match(
    base: &[Variant],
    next: &[Variant],
    match_ref: bool,
    match_alt: bool,
    match_seq: bool,
) -> Vec<SupportRow> {
    let mut out = Vec::new();

    let mut base_idx: Vec<usize> = (0..base.len()).collect();
    base_idx.sort_by(|&a, &b| {
        key(&base[a], match_ref, match_alt, match_seq).cmp(&key(&base[b], match_ref, match_alt, match_seq))
    });
    let mut next_idx: Vec<usize> = (0..next.len()).collect();
    next_idx.sort_by(|&a, &b| {
        key(&next[a], match_ref, match_alt, match_seq).cmp(&key(&next[b], match_ref, match_alt, match_seq))
    });

    let (mut i, mut j) = (0usize, 0usize);

    while i < base_idx.len() && j < next_idx.len() {
        let (bi, nj) = (base_idx[i], next_idx[j]);
        let ki = key(&base[bi], match_ref, match_alt, match_seq);
        let kj = key(&next[nj], match_ref, match_alt, match_seq);

        match ki.cmp(&kj) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(SupportRow {
                    id: base[bi].id.clone(),
                    target_id: next[nj].id.clone(),
                    offset: 0,
                    ro: 1.0,
                    szro: 1.0,
                    offsz: 0.0,
                    r#match: if match_seq { Some(1.0) } else { None },
                });
                i += 1;
                j += 1;
            }
        }
    }

    out
}
