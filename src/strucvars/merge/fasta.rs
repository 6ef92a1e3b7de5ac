//! Sequence source for the `SEQ` left-join the loader performs when
//! sequence-alignment gating (`match=...`) is enabled.
//!
//! No FASTA reader in the corpus fits: `noodles_vcf` (used elsewhere in
//! this crate) doesn't read FASTA, and `bio::io::fasta` isn't a dependency
//! anywhere the corpus touches this format. This is a small from-scratch
//! linear reader; it is adequate at per-sample variant-table sizes (no
//! random access via `.fai` is needed).

use std::collections::HashMap;
use std::io::BufRead;

use crate::strucvars::merge::error::MergeError;

/// A source of variant sequences keyed by record ID, as the loader's
/// `SEQ` left-join needs.
pub trait SequenceSource {
    fn get(&self, id: &str) -> Option<&[u8]>;
}

/// An in-memory index built by reading an entire FASTA file linearly.
#[derive(Debug, Clone, Default)]
pub struct FastaIndexSource {
    records: HashMap<String, Vec<u8>>,
}

impl FastaIndexSource {
    pub fn from_reader(
        sample: &str,
        reader: impl BufRead,
    ) -> Result<Self, MergeError> {
        let mut records = HashMap::new();
        let mut current_id: Option<String> = None;
        let mut current_seq: Vec<u8> = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|e| MergeError::Sequence {
                sample: sample.to_string(),
                message: format!("I/O error reading FASTA: {e}"),
            })?;
            if let Some(header) = line.strip_prefix('>') {
                if let Some(id) = current_id.take() {
                    records.insert(id, std::mem::take(&mut current_seq));
                }
                let id = header
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                current_id = Some(id);
            } else {
                current_seq.extend(line.trim_end().bytes().map(|b| b.to_ascii_uppercase()));
            }
        }
        if let Some(id) = current_id.take() {
            records.insert(id, current_seq);
        }

        Ok(Self { records })
    }

    pub fn from_path(sample: &str, path: impl AsRef<std::path::Path>) -> Result<Self, MergeError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| MergeError::Sequence {
            sample: sample.to_string(),
            message: format!("could not open FASTA {path:?}: {e}"),
        })?;
        Self::from_reader(sample, std::io::BufReader::new(file))
    }
}

impl SequenceSource for FastaIndexSource {
    fn get(&self, id: &str) -> Option<&[u8]> {
        self.records.get(id).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_multi_record_fasta() {
        let fasta = b">id1 some description\nACGT\nACGT\n>id2\nNNNN\n".as_slice();
        let source = FastaIndexSource::from_reader("s", fasta).unwrap();
        assert_eq!(source.get("id1"), Some(b"ACGTACGT".as_slice()));
        assert_eq!(source.get("id2"), Some(b"NNNN".as_slice()));
        assert_eq!(source.get("missing"), None);
    }

    #[test]
    fn uppercases_sequence() {
        let fasta = b">id1\nacgt\n".as_slice();
        let source = FastaIndexSource::from_reader("s", fasta).unwrap();
        assert_eq!(source.get("id1"), Some(b"ACGT".as_slice()));
    }
}
