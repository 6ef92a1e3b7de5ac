//! Parser for the `:`-separated merge parameter mini-language
//! (`ro=0.8:szro=0.8:offset=200:expand`), ported from
//! `svmerge.get_param_set`.

use crate::strucvars::merge::error::MergeError;

/// Sequence-alignment scoring knobs bound by the `match=` sub-parameter.
/// Defaults come from `svmerge.ALIGN_PARAM_FIELD_LIST`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignParams {
    pub score_prop: f64,
    pub match_score: f64,
    pub mismatch: f64,
    pub gap_open: f64,
    pub gap_extend: f64,
    pub map_limit: Option<usize>,
    pub jaccard_k: usize,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            score_prop: 0.8,
            match_score: 2.0,
            mismatch: -1.0,
            gap_open: -5.0,
            gap_extend: -0.5,
            map_limit: Some(20_000),
            jaccard_k: 9,
        }
    }
}

/// Fully parsed merge parameter set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeParams {
    pub ro_min: Option<f64>,
    pub szro_min: Option<f64>,
    pub offset_max: Option<u32>,
    pub match_ref: bool,
    pub match_alt: bool,
    pub expand_base: bool,
    pub align: Option<AlignParams>,
}

impl MergeParams {
    /// Whether the resolver needs sequence data at all.
    pub fn match_seq(&self) -> bool {
        self.align.is_some()
    }

    pub fn parse(spec: &str) -> Result<Self, MergeError> {
        let mut params = MergeParams::default();
        let mut align = AlignParams::default();
        let mut align_set = false;

        for token in spec.split(':') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), Some(v.trim())),
                None => (token.to_ascii_lowercase(), None),
            };

            match key.as_str() {
                "ro" => {
                    let v = value.ok_or_else(|| {
                        MergeError::Configuration("'ro' requires a value".into())
                    })?;
                    if v.eq_ignore_ascii_case("any") {
                        return Err(MergeError::Configuration(
                            "'ro=any' is not yet implemented".into(),
                        ));
                    }
                    params.ro_min = Some(parse_percent(v)?);
                }
                "szro" => {
                    let v = value.ok_or_else(|| {
                        MergeError::Configuration("'szro' requires a value".into())
                    })?;
                    params.szro_min = if v.eq_ignore_ascii_case("any") {
                        None
                    } else {
                        Some(parse_percent(v)?)
                    };
                }
                "offset" => {
                    let v = value.ok_or_else(|| {
                        MergeError::Configuration("'offset' requires a value".into())
                    })?;
                    params.offset_max = if v.eq_ignore_ascii_case("any") {
                        None
                    } else {
                        let parsed: i64 = v.parse().map_err(|_| {
                            MergeError::Configuration(format!("invalid 'offset' value: {v:?}"))
                        })?;
                        if parsed < 0 {
                            return Err(MergeError::Configuration(
                                "'offset' must be >= 0".into(),
                            ));
                        }
                        Some(parsed as u32)
                    };
                }
                "refalt" => {
                    require_no_value(&value, "refalt")?;
                    params.match_ref = true;
                    params.match_alt = true;
                }
                "ref" => {
                    require_no_value(&value, "ref")?;
                    params.match_ref = true;
                }
                "alt" => {
                    require_no_value(&value, "alt")?;
                    params.match_alt = true;
                }
                "expand" => {
                    require_no_value(&value, "expand")?;
                    params.expand_base = true;
                }
                "match" => {
                    align_set = true;
                    if let Some(v) = value {
                        parse_align_subargs(v, &mut align)?;
                    }
                }
                other => {
                    return Err(MergeError::Configuration(format!(
                        "unknown merge parameter key: {other:?}"
                    )));
                }
            }
        }

        if params.szro_min.is_some() && params.offset_max.is_none() {
            return Err(MergeError::Configuration(
                "'szro' was set without 'offset'".into(),
            ));
        }

        // Open question 1: an RO threshold is implied by an SZRO threshold
        // when none was set explicitly (svmerge.py:957-958).
        if params.ro_min.is_none() && params.szro_min.is_some() {
            params.ro_min = params.szro_min;
        }

        if align_set {
            params.align = Some(align);
        }

        Ok(params)
    }
}

fn require_no_value(value: &Option<&str>, key: &str) -> Result<(), MergeError> {
    if value.is_some() {
        Err(MergeError::Configuration(format!(
            "'{key}' does not take a value"
        )))
    } else {
        Ok(())
    }
}

fn parse_percent(v: &str) -> Result<f64, MergeError> {
    let parsed: i64 = v
        .parse()
        .map_err(|_| MergeError::Configuration(format!("invalid percentage value: {v:?}")))?;
    if !(0..=100).contains(&parsed) {
        return Err(MergeError::Configuration(format!(
            "percentage value out of range 0-100: {parsed}"
        )));
    }
    Ok(parsed as f64 / 100.0)
}

/// Parse the up-to-7 comma-separated positional sub-args of `match=`.
/// An empty sub-arg token leaves the corresponding default unchanged.
fn parse_align_subargs(v: &str, align: &mut AlignParams) -> Result<(), MergeError> {
    for (i, tok) in v.split(',').enumerate() {
        let tok = tok.trim();
        if tok.is_empty() {
            continue;
        }
        match i {
            0 => {
                let x: f64 = parse_f64(tok, "SCORE-PROP")?;
                if !(0.0..=1.0).contains(&x) || x == 0.0 {
                    return Err(MergeError::Configuration(
                        "SCORE-PROP must be in (0, 1]".into(),
                    ));
                }
                align.score_prop = x;
            }
            1 => {
                let x: f64 = parse_f64(tok, "MATCH")?;
                if x <= 0.0 {
                    return Err(MergeError::Configuration("MATCH must be > 0".into()));
                }
                align.match_score = x;
            }
            2 => {
                let x: f64 = parse_f64(tok, "MISMATCH")?;
                if x > 0.0 {
                    return Err(MergeError::Configuration("MISMATCH must be <= 0".into()));
                }
                align.mismatch = x;
            }
            3 => {
                let x: f64 = parse_f64(tok, "GAP-OPEN")?;
                if x > 0.0 {
                    return Err(MergeError::Configuration("GAP-OPEN must be <= 0".into()));
                }
                align.gap_open = x;
            }
            4 => {
                let x: f64 = parse_f64(tok, "GAP-EXTEND")?;
                if x > 0.0 {
                    return Err(MergeError::Configuration("GAP-EXTEND must be <= 0".into()));
                }
                align.gap_extend = x;
            }
            5 => {
                if tok.eq_ignore_ascii_case("na") || tok.eq_ignore_ascii_case("unlimited") {
                    align.map_limit = None;
                } else {
                    let x: i64 = tok.parse().map_err(|_| {
                        MergeError::Configuration(format!("invalid MAP-LIMIT value: {tok:?}"))
                    })?;
                    if x < 0 {
                        return Err(MergeError::Configuration(
                            "MAP-LIMIT must be >= 0".into(),
                        ));
                    }
                    align.map_limit = Some(x as usize);
                }
            }
            6 => {
                let x: i64 = tok.parse().map_err(|_| {
                    MergeError::Configuration(format!("invalid JACCARD-KMER value: {tok:?}"))
                })?;
                if x <= 0 {
                    return Err(MergeError::Configuration("JACCARD-KMER must be > 0".into()));
                }
                align.jaccard_k = x as usize;
            }
            _ => {
                return Err(MergeError::Configuration(
                    "'match' takes at most 7 positional sub-arguments".into(),
                ));
            }
        }
    }
    Ok(())
}

fn parse_f64(tok: &str, name: &str) -> Result<f64, MergeError> {
    tok.parse()
        .map_err(|_| MergeError::Configuration(format!("invalid {name} value: {tok:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_when_empty() {
        let p = MergeParams::parse("").unwrap();
        assert_eq!(p, MergeParams::default());
    }

    #[test]
    fn basic_ro_szro_offset() {
        let p = MergeParams::parse("ro=80:szro=80:offset=200:expand").unwrap();
        assert_eq!(p.ro_min, Some(0.8));
        assert_eq!(p.szro_min, Some(0.8));
        assert_eq!(p.offset_max, Some(200));
        assert!(p.expand_base);
    }

    #[test]
    fn szro_without_offset_is_an_error() {
        let err = MergeParams::parse("szro=80").unwrap_err();
        assert!(matches!(err, MergeError::Configuration(_)));
    }

    #[test]
    fn szro_implies_ro_when_ro_absent() {
        let p = MergeParams::parse("szro=70:offset=100").unwrap();
        assert_eq!(p.ro_min, Some(0.7));
    }

    #[test]
    fn ro_any_rejected() {
        let err = MergeParams::parse("ro=any").unwrap_err();
        assert!(matches!(err, MergeError::Configuration(_)));
    }

    #[test]
    fn refalt_sets_both_flags() {
        let p = MergeParams::parse("refalt").unwrap();
        assert!(p.match_ref);
        assert!(p.match_alt);
    }

    #[test]
    fn match_sets_align_defaults_when_bare() {
        let p = MergeParams::parse("match").unwrap();
        let align = p.align.unwrap();
        assert_eq!(align, AlignParams::default());
    }

    #[test]
    fn match_overrides_only_given_positions() {
        let p = MergeParams::parse("match=0.9,,,-8").unwrap();
        let align = p.align.unwrap();
        assert_eq!(align.score_prop, 0.9);
        assert_eq!(align.match_score, AlignParams::default().match_score);
        assert_eq!(align.gap_open, -8.0);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = MergeParams::parse("bogus=1").unwrap_err();
        assert!(matches!(err, MergeError::Configuration(_)));
    }
}
