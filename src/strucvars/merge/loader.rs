//! Per-sample variant table loader.
//!
//! Ported from `svmerge.read_variant_table`: read the table, left-join
//! sequences, derive/default missing `SVLEN`/`SVTYPE`, validate, sort, and
//! keep pass-through columns around for the final output.

use std::path::Path;

use indexmap::IndexMap;

use crate::strucvars::merge::error::MergeError;
use crate::strucvars::merge::fasta::SequenceSource;
use crate::strucvars::merge::schema::{SvType, Variant};

const RECOGNIZED: &[&str] = &["#CHROM", "POS", "END", "ID", "SVTYPE", "SVLEN", "REF", "ALT", "SEQ"];

/// A loaded, validated, sorted per-sample variant table.
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub sample: String,
    pub rows: Vec<Variant>,
}

/// What columns the loaded table must/may carry, derived from the merge
/// parameters (`ref`/`alt`/`match` flags).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadRequirements {
    pub require_ref: bool,
    pub require_alt: bool,
    pub require_seq: bool,
}

pub fn load_sample(
    sample: &str,
    path: &Path,
    seq_source: Option<&dyn SequenceSource>,
    reqs: LoadRequirements,
) -> Result<SampleTable, MergeError> {
    let file = std::fs::File::open(path).map_err(|e| MergeError::Schema {
        sample: sample.to_string(),
        file: path.display().to_string(),
        message: format!("could not open file: {e}"),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let schema_err = |message: String| MergeError::Schema {
        sample: sample.to_string(),
        file: path.display().to_string(),
        message,
    };

    let headers = reader
        .headers()
        .map_err(|e| schema_err(format!("could not read header row: {e}")))?
        .clone();

    let col_index = |name: &str| headers.iter().position(|h| h == name);

    let idx_chrom = col_index("#CHROM").ok_or_else(|| schema_err("missing column #CHROM".into()))?;
    let idx_pos = col_index("POS").ok_or_else(|| schema_err("missing column POS".into()))?;
    let idx_end = col_index("END").ok_or_else(|| schema_err("missing column END".into()))?;
    let idx_id = col_index("ID").ok_or_else(|| schema_err("missing column ID".into()))?;
    let idx_svtype = col_index("SVTYPE");
    let idx_svlen = col_index("SVLEN");
    let idx_ref = col_index("REF");
    let idx_alt = col_index("ALT");
    let idx_seq = col_index("SEQ");

    if reqs.require_ref && idx_ref.is_none() {
        return Err(schema_err("REF column required but absent (ref/refalt set)".into()));
    }
    if reqs.require_alt && idx_alt.is_none() {
        return Err(schema_err("ALT column required but absent (alt/refalt set)".into()));
    }
    if idx_seq.is_some() && seq_source.is_some() {
        return Err(MergeError::Sequence {
            sample: sample.to_string(),
            message: "duplicate SEQ sources: both a SEQ column and a FASTA file were supplied"
                .to_string(),
        });
    }
    if reqs.require_seq && idx_seq.is_none() && seq_source.is_none() {
        return Err(MergeError::Sequence {
            sample: sample.to_string(),
            message: "sequence alignment requested ('match') but no SEQ column or FASTA source"
                .to_string(),
        });
    }

    let extra_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !RECOGNIZED.contains(name))
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut rows = Vec::new();
    let mut missing_seq_ids = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| schema_err(format!("could not parse row: {e}")))?;

        let get = |idx: usize| -> Result<&str, MergeError> {
            record
                .get(idx)
                .ok_or_else(|| schema_err("row has fewer columns than the header".into()))
        };

        let chrom = get(idx_chrom)?.to_string();
        let pos: i64 = get(idx_pos)?
            .parse()
            .map_err(|_| schema_err(format!("invalid POS value: {:?}", get(idx_pos)?)))?;
        let end: i64 = get(idx_end)?
            .parse()
            .map_err(|_| schema_err(format!("invalid END value: {:?}", get(idx_end)?)))?;
        let id = get(idx_id)?.to_string();

        let sv_type: SvType = match idx_svtype {
            Some(idx) => get(idx)?
                .parse()
                .map_err(|_| schema_err(format!("unrecognized SVTYPE: {:?}", get(idx).unwrap())))?,
            None => SvType::Rgn,
        };

        let sv_len: i64 = match idx_svlen {
            Some(idx) => get(idx)?
                .parse()
                .map_err(|_| schema_err(format!("invalid SVLEN value: {:?}", get(idx).unwrap())))?,
            None => {
                if sv_type == SvType::Ins {
                    return Err(schema_err(format!(
                        "missing SVLEN for INS record {id:?}: cannot derive from END-POS"
                    )));
                }
                end - pos
            }
        };

        let r#ref = idx_ref.map(|idx| get(idx)).transpose()?.map(|s| s.to_string());
        let alt = idx_alt.map(|idx| get(idx)).transpose()?.map(|s| s.to_string());

        let seq: Option<Vec<u8>> = if let Some(idx) = idx_seq {
            Some(get(idx)?.to_ascii_uppercase().into_bytes())
        } else if let Some(source) = seq_source {
            match source.get(&id) {
                Some(bytes) => Some(bytes.to_vec()),
                None => {
                    missing_seq_ids.push(id.clone());
                    None
                }
            }
        } else {
            None
        };

        let mut extra = IndexMap::new();
        for (idx, name) in &extra_cols {
            extra.insert(name.clone(), get(*idx)?.to_string());
        }

        rows.push(Variant {
            chrom,
            pos,
            end,
            id,
            sv_type,
            sv_len,
            r#ref,
            alt,
            seq,
            extra,
        });
    }

    if !missing_seq_ids.is_empty() {
        let mut shown = missing_seq_ids.clone();
        shown.truncate(3);
        return Err(MergeError::MissingSequences {
            sample: sample.to_string(),
            ids: shown,
        });
    }

    for v in &rows {
        if v.sv_len < 0 {
            return Err(schema_err(format!("negative SVLEN for record {:?}", v.id)));
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut dups = Vec::new();
    for v in &rows {
        if !seen.insert(v.id.as_str()) {
            dups.push(v.id.clone());
        }
    }
    if !dups.is_empty() {
        dups.truncate(3);
        return Err(MergeError::DuplicateId {
            sample: sample.to_string(),
            file: path.display().to_string(),
            ids: dups,
        });
    }

    rows.sort_by(|a, b| {
        (&a.chrom, a.pos, a.sv_len, &a.id).cmp(&(&b.chrom, b.pos, b.sv_len, &b.id))
    });

    Ok(SampleTable {
        sample: sample.to_string(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_and_sorts_basic_table() {
        let f = write_tmp(
            "#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\n\
             chr1\t200\t300\tb\tDEL\t100\n\
             chr1\t100\t150\ta\tDEL\t50\n",
        );
        let table = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].id, "a");
        assert_eq!(table.rows[1].id, "b");
    }

    #[test]
    fn derives_svlen_when_absent() {
        let f = write_tmp("#CHROM\tPOS\tEND\tID\n chr1\t100\t150\ta\n".trim_start());
        let table = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap();
        assert_eq!(table.rows[0].sv_len, 50);
        assert_eq!(table.rows[0].sv_type, SvType::Rgn);
    }

    #[test]
    fn derivation_forbidden_for_ins() {
        let f = write_tmp("#CHROM\tPOS\tEND\tID\tSVTYPE\n chr1\t100\t101\ta\tINS\n".trim_start());
        let err = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap_err();
        assert!(matches!(err, MergeError::Schema { .. }));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let f = write_tmp(
            "#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\n\
             chr1\t100\t150\ta\tDEL\t50\n\
             chr1\t200\t250\ta\tDEL\t50\n",
        );
        let err = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateId { .. }));
    }

    #[test]
    fn negative_svlen_rejected() {
        let f = write_tmp("#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\n chr1\t100\t150\ta\tDEL\t-1\n".trim_start());
        let err = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap_err();
        assert!(matches!(err, MergeError::Schema { .. }));
    }

    #[test]
    fn extra_columns_preserved() {
        let f = write_tmp(
            "#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\tNOTE\n\
             chr1\t100\t150\ta\tDEL\t50\thello\n",
        );
        let table = load_sample("s1", f.path(), None, LoadRequirements::default()).unwrap();
        assert_eq!(table.rows[0].extra.get("NOTE"), Some(&"hello".to_string()));
    }

    #[test]
    fn missing_sequence_is_fatal() {
        struct Empty;
        impl SequenceSource for Empty {
            fn get(&self, _id: &str) -> Option<&[u8]> {
                None
            }
        }
        let f = write_tmp("#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\n chr1\t100\t150\ta\tDEL\t50\n".trim_start());
        let err = load_sample(
            "s1",
            f.path(),
            Some(&Empty),
            LoadRequirements {
                require_seq: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::MissingSequences { .. }));
    }

    #[test]
    fn duplicate_seq_source_rejected() {
        struct Empty;
        impl SequenceSource for Empty {
            fn get(&self, _id: &str) -> Option<&[u8]> {
                Some(b"ACGT")
            }
        }
        let f = write_tmp(
            "#CHROM\tPOS\tEND\tID\tSVTYPE\tSVLEN\tSEQ\n chr1\t100\t150\ta\tDEL\t50\tACGT\n"
                .trim_start(),
        );
        let err = load_sample("s1", f.path(), Some(&Empty), LoadRequirements::default()).unwrap_err();
        assert!(matches!(err, MergeError::Sequence { .. }));
    }
}
