//! Error types for the `strucvars merge` command.

use std::process::ExitCode;

/// Errors raised while parsing parameters, loading samples, or merging.
#[derive(thiserror::Error, Debug, Clone)]
pub enum MergeError {
    /// A `match=` parameter string could not be parsed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A per-sample input table is missing a required column or has a type
    /// mismatch.
    #[error("schema error in sample {sample} ({file}): {message}")]
    Schema {
        sample: String,
        file: String,
        message: String,
    },

    /// A sample's variant IDs are not unique.
    #[error("duplicate variant ID in sample {sample} ({file}): {ids:?}")]
    DuplicateId {
        sample: String,
        file: String,
        ids: Vec<String>,
    },

    /// `version_id` encountered a `.` suffix that does not parse as an
    /// integer, so it cannot decide the next version number.
    #[error("malformed versioned ID suffix: {0:?}")]
    MalformedVersionSuffix(String),

    /// A FASTA source could not be read, or yielded a malformed record.
    #[error("sequence error for sample {sample}: {message}")]
    Sequence { sample: String, message: String },

    /// A variant ID in a sample's table has no matching FASTA sequence.
    #[error("missing sequences for sample {sample}: {ids:?}")]
    MissingSequences { sample: String, ids: Vec<String> },

    /// Something went wrong while resolving a packet of candidate pairs.
    #[error("worker failure resolving packet on {chrom}: {message}")]
    Runtime { chrom: String, message: String },

    /// An invariant the merge pipeline depends on was violated; this points
    /// at a bug in the pipeline rather than bad input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl MergeError {
    /// Map each error kind to a distinct process exit code.
    pub fn exit_code(&self) -> ExitCode {
        let code = match self {
            MergeError::Configuration(_) => 2,
            MergeError::Schema { .. } => 3,
            MergeError::DuplicateId { .. } | MergeError::MalformedVersionSuffix(_) => 4,
            MergeError::Sequence { .. } | MergeError::MissingSequences { .. } => 5,
            MergeError::Runtime { .. } => 6,
            MergeError::Invariant(_) => 70,
        };
        ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let errs = [
            MergeError::Configuration("x".into()),
            MergeError::Schema {
                sample: "a".into(),
                file: "a.tsv".into(),
                message: "m".into(),
            },
            MergeError::DuplicateId {
                sample: "a".into(),
                file: "a.tsv".into(),
                ids: vec!["id1".into()],
            },
            MergeError::MalformedVersionSuffix("id.x".into()),
            MergeError::Sequence {
                sample: "a".into(),
                message: "m".into(),
            },
            MergeError::MissingSequences {
                sample: "a".into(),
                ids: vec!["id1".into()],
            },
            MergeError::Runtime {
                chrom: "1".into(),
                message: "m".into(),
            },
            MergeError::Invariant("m".into()),
        ];
        for e in &errs {
            let _ = e.exit_code();
        }
    }
}
