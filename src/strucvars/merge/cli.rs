//! Command line interface for the `strucvars merge` subcommand.
//!
//! Shaped after `strucvars::aggregate::cli`: a `clap::Parser` `Args`
//! struct, a `run(common_args, args)` entry point logging phase boundaries
//! with `tracing` and checkpointing memory with `trace_rss_now`, and output
//! written with `csv::WriterBuilder`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use crate::common::trace_rss_now;
use crate::strucvars::merge::accumulate::Accumulator;
use crate::strucvars::merge::align::GotohAligner;
use crate::strucvars::merge::fasta::{FastaIndexSource, SequenceSource};
use crate::strucvars::merge::finalize::{finalize, FinalRow};
use crate::strucvars::merge::loader::{load_sample, LoadRequirements};
use crate::strucvars::merge::params::MergeParams;

/// One `--sample NAME,TABLE[,FASTA]` argument, in merge order.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub name: String,
    pub table: PathBuf,
    pub fasta: Option<PathBuf>,
}

impl std::str::FromStr for SampleSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ',');
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "sample spec is missing a name".to_string())?
            .to_string();
        let table = parts
            .next()
            .ok_or_else(|| format!("sample {name:?} is missing a table path"))?;
        let fasta = parts.next().map(PathBuf::from);
        Ok(SampleSpec {
            name,
            table: PathBuf::from(table),
            fasta,
        })
    }
}

/// Command line arguments for the `strucvars merge` sub command.
#[derive(Parser, Debug)]
#[command(about = "Merge per-sample structural variant call tables", long_about = None)]
pub struct Args {
    /// Merge parameter spec, e.g. `ro=80:szro=80:offset=200:expand`.
    #[arg(long, default_value = "")]
    pub merge_params: String,
    /// One entry per sample, in merge order: `NAME,TABLE[,FASTA]`.
    #[arg(long = "sample", required = true)]
    pub samples: Vec<SampleSpec>,
    /// Path to the merged output TSV file.
    #[arg(long)]
    pub path_output: PathBuf,
    /// Number of resolver worker threads.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
}

/// Main entry point for the `strucvars merge` command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting `strucvars merge`");
    tracing::info!("  common_args = {:?}", &common_args);
    tracing::info!("  args = {:?}", &args);

    let params = MergeParams::parse(&args.merge_params)?;
    let reqs = LoadRequirements {
        require_ref: params.match_ref,
        require_alt: params.match_alt,
        require_seq: params.match_seq(),
    };

    tracing::info!("loading {} sample tables", args.samples.len());
    let mut tables = Vec::with_capacity(args.samples.len());
    for spec in &args.samples {
        tracing::debug!("loading sample {:?} from {:?}", spec.name, spec.table);
        let seq_source = spec
            .fasta
            .as_ref()
            .map(|p| FastaIndexSource::from_path(&spec.name, p))
            .transpose()?;
        let table = load_sample(
            &spec.name,
            &spec.table,
            seq_source.as_ref().map(|s| s as &dyn SequenceSource),
            reqs,
        )?;
        tables.push(table);
    }
    trace_rss_now();

    let align_defaults = params.align.clone().unwrap_or_default();
    let aligner = GotohAligner::new(
        align_defaults.match_score,
        align_defaults.mismatch,
        align_defaults.gap_open,
        align_defaults.gap_extend,
    );

    let n_samples = tables.len();
    let sample_names: Vec<String> = tables.iter().map(|t| t.sample.clone()).collect();

    let mut accumulator = Accumulator::new(0, tables[0].rows.clone());

    let before = Instant::now();
    for (sample_index, table) in tables.iter().enumerate().skip(1) {
        tracing::info!(
            "merging sample {:?} ({}/{})",
            table.sample,
            sample_index + 1,
            n_samples
        );
        accumulator.fold_sample(sample_index, table, &params, &aligner, args.threads)?;
        trace_rss_now();
    }
    tracing::debug!("folded {} samples in {:?}", n_samples, before.elapsed());

    let records = accumulator.finish();
    let final_rows = finalize(records, n_samples)?;

    write_output(&args.path_output, &final_rows, &sample_names)?;
    tracing::info!("wrote {} merged records to {:?}", final_rows.len(), &args.path_output);

    Ok(())
}

fn write_output(path: &PathBuf, rows: &[FinalRow], sample_names: &[String]) -> Result<(), anyhow::Error> {
    let mut extra_cols: Vec<String> = Vec::new();
    for row in rows {
        for key in row.extra.keys() {
            if !extra_cols.contains(key) {
                extra_cols.push(key.clone());
            }
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(BufWriter::new(File::create(path)?));

    let mut header: Vec<String> = vec![
        "#CHROM", "POS", "END", "ID", "SVTYPE", "SVLEN", "REF", "ALT",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    header.extend(extra_cols.iter().cloned());
    header.extend(
        [
            "MERGE_SRC",
            "MERGE_SRC_ID",
            "MERGE_AC",
            "MERGE_AF",
            "MERGE_SAMPLES",
            "MERGE_VARIANTS",
            "MERGE_RO",
            "MERGE_OFFSET",
            "MERGE_SZRO",
            "MERGE_OFFSZ",
            "MERGE_MATCH",
        ]
        .into_iter()
        .map(String::from),
    );
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.chrom.clone(),
            row.pos.to_string(),
            row.end.to_string(),
            row.id.clone(),
            row.sv_type.to_string(),
            row.sv_len.to_string(),
            row.r#ref.clone().unwrap_or_default(),
            row.alt.clone().unwrap_or_default(),
        ];
        for key in &extra_cols {
            record.push(row.extra.get(key).cloned().unwrap_or_default());
        }
        record.push(sample_names[row.merge_src].clone());
        record.push(row.merge_src_id.clone());
        record.push(row.merge_ac.to_string());
        record.push(format!("{:.4}", row.merge_af));
        record.push(
            row.merge_samples
                .iter()
                .map(|s| sample_names[*s].clone())
                .collect::<Vec<_>>()
                .join(","),
        );
        record.push(row.merge_variants.join(","));
        record.push(row.merge_ro.iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(","));
        record.push(row.merge_offset.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","));
        record.push(row.merge_szro.iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(","));
        record.push(row.merge_offsz.iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(","));
        record.push(row.merge_match.iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(","));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
