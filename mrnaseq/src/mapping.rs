/// Tasks from the reads to indexed BAM files: sample table, STAR mapping, indexing and
/// re-adding sequence qualities.
use std::path::Path;
use std::sync::Arc;

use lib_pipeline::{Context, FilePattern, Job, Pipeline, Result, ResultExt, Statement, Task};
use lib_shared::run_mode::PAIRED_SUFFIX;

use super::pipeline::{quoted, statement, with_suffix, Setup};
use super::statements;

/// Output of `make_sample_info_table`.
pub const SAMPLE_INFO: &str = "sample_info.txt";

/// STAR alignment of one sample; `read1` is the single-end file or the first mate.
pub fn star_statement(setup: &Setup, read1: &Path, outfile: &Path) -> Result<Statement> {
    let params = &setup.params;
    let log_prefix = format!("{}.", with_suffix(outfile, ".bam", "")?.display());
    let mut values = vec![
        ("tmp_dir", quoted(&params.tmp_dir)),
        ("threads", params.star.threads.to_string()),
        ("genome_dir", quoted(&params.star.index_dir)),
        ("log_prefix", quoted(&log_prefix)),
        ("outfile", quoted(outfile)),
    ];
    let template = if setup.mode.unpaired {
        values.push(("infile", quoted(read1)));
        statements::STAR_SINGLE
    } else {
        values.push(("read1", quoted(read1)));
        values.push((
            "read2",
            quoted(with_suffix(read1, PAIRED_SUFFIX, ".fastq.2.gz")?),
        ));
        statements::STAR_PAIRED
    };
    Ok(statement(template, &values)?.threads(params.star.threads))
}

/// Statements re-adding sequence qualities, or linking the BAM file and its index.
pub fn pseudo_quality_statements(
    setup: &Setup,
    infile: &Path,
    outfile: &Path,
) -> Result<Vec<Statement>> {
    let out_index = with_suffix(outfile, ".bam", ".bam.bai")?;
    if setup.params.cgat_mapping.enabled {
        let mut bam2bam = statement(
            statements::BAM2BAM,
            &[
                ("infile", quoted(infile)),
                ("log", quoted(with_suffix(outfile, ".bam", ".bam2bam.log")?)),
                ("outfile", quoted(outfile)),
            ],
        )?;
        if let Some(ref venv) = setup.params.cgat_mapping.venv {
            bam2bam = bam2bam.condaenv(venv);
        }
        let index = statement(
            statements::SAMTOOLS_INDEX,
            &[("infile", quoted(outfile)), ("outfile", quoted(&out_index))],
        )?;
        Ok(vec![bam2bam, index])
    } else {
        Ok(vec![statement(
            statements::SYMLINK_BAM,
            &[
                ("infile", quoted(infile)),
                ("outfile", quoted(outfile)),
                ("in_index", quoted(with_suffix(infile, ".bam", ".bam.bai")?)),
                ("out_index", quoted(&out_index)),
            ],
        )?])
    }
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    let input_dir = setup.params.input_dir.clone();

    pipeline.add({
        let setup = setup.clone();
        Task::new("make_sample_info_table")
            .describe("Parse sample names into the sample information table")
            .originate(SAMPLE_INFO)
            .body(move |ctx, job| {
                let built = lib_samples::make_sample_info_table(
                    &ctx.logger,
                    ctx.path(&setup.params.input_dir),
                    ctx.path(job.output()?),
                    ctx.path(&setup.db_path),
                )
                .chain_err(|| "Could not build sample information table")?;
                if !built {
                    warn!(ctx.logger, "No sample information table written");
                }
                Ok(())
            })
    })?;

    let star_body = {
        let setup = setup.clone();
        move |ctx: &Context, job: &Job| -> Result<()> {
            ctx.run(&star_statement(&setup, job.input()?, job.output()?)?)
        }
    };
    pipeline.add(
        Task::new("star_mapping")
            .describe("Map paired-end reads with STAR")
            .follows(&["make_sample_info_table"])
            .mkdir("star.dir")
            .active_if(setup.mode.paired())
            .transform(
                FilePattern::new(&input_dir, r"^(.+)\.fastq\.1\.gz$")?,
                &["star.dir/${1}.bam"],
            )
            .body(star_body.clone()),
    )?;
    pipeline.add(
        Task::new("star_mapping_se")
            .describe("Map single-end reads with STAR")
            .follows(&["make_sample_info_table"])
            .mkdir("star.dir")
            .active_if(setup.mode.unpaired)
            .transform(
                FilePattern::new(&input_dir, r"^(.+)\.fastq\.gz$")?,
                &["star.dir/${1}.bam"],
            )
            .body(star_body),
    )?;

    pipeline.add(
        Task::new("index_bam")
            .describe("Index the STAR alignments")
            .follows(&["star_mapping", "star_mapping_se"])
            .transform(
                FilePattern::new("star.dir", r"^(.+)\.bam$")?,
                &["star.dir/${1}.bam.bai"],
            )
            .body(|ctx, job| {
                ctx.run(&statement(
                    statements::SAMTOOLS_INDEX,
                    &[
                        ("infile", quoted(job.input()?)),
                        ("outfile", quoted(job.output()?)),
                    ],
                )?)
            }),
    )?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("add_pseudo_sequence_quality")
            .describe("Re-add sequence qualities so QC tools accept the alignments")
            .follows(&["index_bam"])
            .mkdir("bam.dir")
            .transform(
                FilePattern::new("star.dir", r"^(.+)\.bam$")?,
                &["bam.dir/${1}.bam"],
            )
            .body(move |ctx, job| {
                for statement in pseudo_quality_statements(&setup, job.input()?, job.output()?)? {
                    ctx.run(&statement)?;
                }
                Ok(())
            })
    })?;

    pipeline.add(
        Task::new("mapping")
            .describe("All mapping tasks")
            .follows(&["index_bam", "add_pseudo_sequence_quality"]),
    )?;

    Ok(())
}
