//! Data model shared by the merge pipeline stages.

use indexmap::IndexMap;

/// Recognized structural variant types.
///
/// Mirrors `strucvars::query::schema::SvType`'s derive shape, widened with
/// the sequence-alteration and region types the merge table format allows
/// (`SNV`, `SUB`, `RGN`) that the background-database SV type set doesn't
/// need.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum SvType {
    Del,
    Dup,
    Ins,
    Inv,
    Cnv,
    Bnd,
    Snv,
    Sub,
    /// Generic region, used when the input table carries no `SVTYPE`.
    Rgn,
}

/// One row of a per-sample variant table, after loading and validation.
///
/// `pos`/`end` are 0-based half-open, matching the on-disk table convention.
/// `extra` holds every pass-through column in first-seen order so columns
/// the merge pipeline doesn't know about survive to the output unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub chrom: String,
    pub pos: i64,
    pub end: i64,
    pub id: String,
    pub sv_type: SvType,
    pub sv_len: i64,
    pub r#ref: Option<String>,
    pub alt: Option<String>,
    pub seq: Option<Vec<u8>>,
    pub extra: IndexMap<String, String>,
}

/// One row of the running merged table `M`: a single contributing variant
/// plus the support metrics linking it to the lead it was folded into.
///
/// `sample`/`support_sample` are indices into the merge's `sample_names`
/// list rather than names, since that list's order *is* the categorical
/// sample order the pipeline sorts by; carrying the index sidesteps a
/// separate categorical-ordering step.
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub variant: Variant,
    pub sample: usize,
    /// ID of the lead this row is folded into. Equal to `variant.id` for a
    /// lead row itself.
    pub support_id: String,
    pub support_sample: usize,
    /// -1 sentinel for a lead's self-support row.
    pub support_offset: i64,
    /// -1.0 sentinel for a lead's self-support row.
    pub support_ro: f64,
    pub support_szro: f64,
    pub support_offsz: f64,
    /// -1.0 sentinel when unset; also used when sequence gating is off.
    pub support_match: f64,
}

impl MergedRecord {
    pub fn is_primary(&self) -> bool {
        self.sample == self.support_sample
    }
}

/// One row of a between-table support/match result: `id` (from the base
/// table) matched to `target_id` (from the next sample's table), with the
/// evidence metrics computed by the overlap resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportRow {
    pub id: String,
    pub target_id: String,
    pub offset: i64,
    pub ro: f64,
    pub szro: f64,
    pub offsz: f64,
    /// `None` when sequence gating is off; `Some(1.0)` for an exact match.
    pub r#match: Option<f64>,
}

/// One row of the per-lead merge summary (the `MERGE_*` columns).
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub support_id: String,
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

/// Discovery class of a merged call, per its allele count/frequency across
/// samples.
pub fn discovery_class(merge_af: f32, merge_ac: u32) -> &'static str {
    if merge_af >= 1.0 {
        "SHARED"
    } else if merge_af >= 0.5 {
        "MAJOR"
    } else if merge_ac > 1 {
        "POLY"
    } else {
        "SINGLE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sv_type_parses_case_insensitively() {
        assert_eq!("del".parse::<SvType>().unwrap(), SvType::Del);
        assert_eq!("DEL".parse::<SvType>().unwrap(), SvType::Del);
        assert_eq!(SvType::Ins.to_string(), "INS");
    }

    #[rstest::rstest]
    #[case(1.0, 3, "SHARED")]
    #[case(0.5, 2, "MAJOR")]
    #[case(0.4, 2, "POLY")]
    #[case(0.2, 1, "SINGLE")]
    fn discovery_class_thresholds(#[case] af: f32, #[case] ac: u32, #[case] expected: &str) {
        assert_eq!(discovery_class(af, ac), expected);
    }
}
