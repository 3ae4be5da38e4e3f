/// Alignment and RNA-seq QC metrics with Picard.
use std::path::Path;
use std::sync::Arc;

use lib_pipeline::{FilePattern, Pipeline, Result, Statement, Task};

use super::pipeline::{concatenate_and_load, quoted, statement, with_suffix, Setup};
use super::statements;

/// Picard `CollectAlignmentSummaryMetrics` without the comment lines.
pub fn alignment_summary_statement(
    setup: &Setup,
    infile: &Path,
    outfile: &Path,
) -> Result<Statement> {
    let params = &setup.params;
    Ok(statement(
        statements::PICARD_ALIGNMENT_SUMMARY,
        &[
            ("tmp_dir", quoted(&params.tmp_dir)),
            ("memory", params.picard.memory.clone()),
            ("reference", quoted(params.genome.fasta())),
            ("infile", quoted(infile)),
            ("outfile", quoted(outfile)),
        ],
    )?
    .threads(params.picard.threads)
    .memory(&params.picard.memory))
}

/// Picard `CollectRnaSeqMetrics`, writing the metrics to `table` and the histogram to `hist`.
pub fn rnaseq_metrics_statement(
    setup: &Setup,
    infile: &Path,
    table: &Path,
    hist: &Path,
) -> Result<Statement> {
    let params = &setup.params;
    Ok(statement(
        statements::PICARD_RNASEQ_METRICS,
        &[
            ("tmp_dir", quoted(&params.tmp_dir)),
            ("memory", params.picard.memory.clone()),
            ("ref_flat", quoted(&params.picard.ref_flat)),
            ("infile", quoted(infile)),
            ("strand", params.strandedness.picard_strand().to_string()),
            ("table", quoted(table)),
            ("hist", quoted(hist)),
        ],
    )?
    .threads(params.picard.threads)
    .memory(&params.picard.memory))
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    pipeline.add({
        let setup = setup.clone();
        Task::new("picard_alignment_summary")
            .describe("Collect alignment summary metrics with Picard")
            .follows(&["mapping"])
            .transform(
                FilePattern::new("bam.dir", r"^(.+)\.bam$")?,
                &["bam.dir/${1}.picardAlignmentStats.txt"],
            )
            .body(move |ctx, job| {
                ctx.run(&alignment_summary_statement(&setup, job.input()?, job.output()?)?)
            })
    })?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("load_picard_alignment_summary")
            .describe("Load the alignment summary metrics into a single table")
            .follows(&["picard_alignment_summary"])
            .merge(
                FilePattern::new("bam.dir", r"^.+\.picardAlignmentStats\.txt$")?,
                "picardAlignmentSummary.load",
            )
            .body(move |ctx, job| {
                concatenate_and_load(
                    ctx,
                    &setup,
                    &job.inputs,
                    r"([^/]+)\.picardAlignmentStats",
                    "sample_id",
                    &["sample_id"],
                    job.output()?,
                )
            })
    })?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("picard_rnaseq_metrics")
            .describe("Collect RNA-seq metrics for stranded libraries with Picard")
            .follows(&["mapping"])
            .active_if(setup.mode.stranded)
            .transform(
                FilePattern::new("bam.dir", r"^(.+)\.bam$")?,
                &[
                    "bam.dir/${1}.picardRNAseqMetrics.txt",
                    "bam.dir/${1}.picardRNAseqMetrics.hist.txt",
                ],
            )
            .body(move |ctx, job| {
                let infile = job.input()?;
                let table = job.output()?;
                let hist = with_suffix(table, ".txt", ".hist.txt")?;
                ctx.run(&rnaseq_metrics_statement(&setup, infile, table, &hist)?)
            })
    })?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("load_picard_rnaseq_metrics")
            .describe("Load the RNA-seq metrics into a single table")
            .follows(&["picard_rnaseq_metrics"])
            .active_if(setup.mode.stranded)
            .merge(
                FilePattern::new("bam.dir", r"^.+\.picardRNAseqMetrics\.txt$")?,
                "picardRNAseqMetrics.load",
            )
            .body(move |ctx, job| {
                concatenate_and_load(
                    ctx,
                    &setup,
                    &job.inputs,
                    r"([^/]+)\.picardRNAseqMetrics",
                    "sample_id",
                    &["sample_id"],
                    job.output()?,
                )
            })
    })?;

    pipeline.add(
        Task::new("summarystats")
            .describe("All QC metrics tasks")
            .follows(&["load_picard_alignment_summary", "load_picard_rnaseq_metrics"]),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use slog::Logger;
    use tempdir::TempDir;

    use lib_pipeline::Context;
    use lib_shared::config::Params;
    use lib_shared::database;
    use lib_shared::run_mode::RunMode;

    use crate::pipeline::test_setup;

    #[test]
    fn test_alignment_summary() {
        let statement = alignment_summary_statement(
            &test_setup(false, false),
            Path::new("bam.dir/WT_1.bam"),
            Path::new("bam.dir/WT_1.picardAlignmentStats.txt"),
        )
        .unwrap();
        assert_eq!(statement.threads, 3);
        assert_eq!(statement.memory, Some("12G".to_string()));
        assert!(statement
            .text
            .contains("picard -Xmx12G CollectAlignmentSummaryMetrics R=hg38.fa I=bam.dir/WT_1.bam"));
    }

    #[test]
    fn test_rnaseq_metrics_strand() {
        let params = Params::from_overlays(&[("test", "strandedness: FR\n")]).unwrap();
        let setup = Setup::new(
            params,
            RunMode {
                unpaired: false,
                stranded: true,
            },
        )
        .unwrap();
        let statement = rnaseq_metrics_statement(
            &setup,
            Path::new("bam.dir/WT_1.bam"),
            Path::new("bam.dir/WT_1.picardRNAseqMetrics.txt"),
            Path::new("bam.dir/WT_1.picardRNAseqMetrics.hist.txt"),
        )
        .unwrap();
        assert!(statement
            .text
            .contains("STRAND=FIRST_READ_TRANSCRIPTION_STRAND &&"));
        assert!(statement
            .text
            .contains("head -n2 > bam.dir/WT_1.picardRNAseqMetrics.txt"));
        assert!(statement
            .text
            .contains("/p' - > bam.dir/WT_1.picardRNAseqMetrics.hist.txt"));
    }

    #[test]
    fn test_load_alignment_summary() {
        let tmp_dir = TempDir::new("mrnaseq_summarystats").unwrap();
        let ctx = Context::new(Logger::root(slog::Discard, o!()), tmp_dir.path());
        fs::create_dir(ctx.path("bam.dir")).unwrap();
        for (sample, reads) in &[("KO_1", 1000), ("WT_1", 2000)] {
            fs::write(
                ctx.path(format!("bam.dir/{}.picardAlignmentStats.txt", sample)),
                format!("CATEGORY\tTOTAL_READS\nPAIR\t{}\n", reads),
            )
            .unwrap();
        }

        let pipeline = crate::pipeline::build(test_setup(false, false)).unwrap();
        let task = pipeline.get("load_picard_alignment_summary").unwrap();
        let jobs = task.jobs(&ctx).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].inputs.len(), 2);
        task.execute(&ctx, &jobs[0]).unwrap();

        let conn = database::open(ctx.path("csvdb")).unwrap();
        let reads: i64 = conn
            .query_row(
                "SELECT TOTAL_READS FROM picardAlignmentSummary WHERE sample_id = 'WT_1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(reads, 2000);
    }
}
