/// Normalised coverage tracks with deepTools.
use std::path::Path;
use std::sync::Arc;

use lib_pipeline::{FilePattern, Pipeline, Result, ResultExt, Statement, Task};
use lib_shared::bam_utils::{self, PAIRED_PROBE_RECORDS};

use super::pipeline::{quoted, statement, Setup};
use super::statements;

/// `bamCoverage` call; paired alignments are counted by their first mates only.
pub fn bam_coverage_statement(
    setup: &Setup,
    infile: &Path,
    outfile: &Path,
    paired: bool,
) -> Result<Statement> {
    let params = &setup.params;
    let template = if paired {
        statements::BAM_COVERAGE_PAIRED
    } else {
        statements::BAM_COVERAGE_SINGLE
    };
    Ok(statement(
        template,
        &[
            ("infile", quoted(infile)),
            ("outfile", quoted(outfile)),
            ("norm_method", quoted(&params.deeptools.norm_method)),
        ],
    )?
    .threads(params.deeptools.threads)
    .memory(&params.deeptools.memory))
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    pipeline.add({
        let setup = setup.clone();
        Task::new("bam_coverage_rna")
            .describe("Make normalised bigWig tracks with deepTools")
            .follows(&["readquant"])
            .transform(
                FilePattern::new("star.dir", r"^(.+)\.bam$")?,
                &["star.dir/${1}.coverage.bw"],
            )
            .body(move |ctx, job| {
                let infile = job.input()?;
                let paired = bam_utils::is_paired(ctx.path(infile), PAIRED_PROBE_RECORDS)
                    .chain_err(|| format!("Could not inspect {}", infile.display()))?;
                debug!(ctx.logger, "{} paired: {}", infile.display(), paired);
                ctx.run(&bam_coverage_statement(
                    &setup,
                    infile,
                    job.output()?,
                    paired,
                )?)
            })
    })?;

    pipeline.add(
        Task::new("coverage")
            .describe("All coverage tasks")
            .follows(&["bam_coverage_rna"]),
    )?;

    Ok(())
}
