/// Raw read counts per gene with featureCounts.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lib_pipeline::{FilePattern, Pipeline, Result, Statement, Task};

use super::pipeline::{load_body, quoted, statement, Setup};
use super::statements;

pub const FEATURE_COUNTS: &str = "read_counts.dir/featureCounts.txt";
pub const FEATURE_COUNTS_LOAD: &str = "read_counts.dir/featureCounts.load";

/// Count the reads of all `bams` in one call, one thread per file.
pub fn feature_counts_statement(
    setup: &Setup,
    bams: &[PathBuf],
    outfile: &Path,
) -> Result<Statement> {
    let params = &setup.params;
    let threads = bams.len().max(1);
    let bams: Vec<String> = bams.iter().map(quoted).collect();
    let pair_opts = if setup.mode.paired() { "-p" } else { "" };
    Ok(statement(
        statements::FEATURE_COUNTS,
        &[
            ("tmp_dir", quoted(&params.tmp_dir)),
            ("geneset", quoted(params.annotations.geneset())),
            ("threads", threads.to_string()),
            ("strand", params.strandedness.feature_counts_strand().to_string()),
            ("pair_opts", pair_opts.to_string()),
            ("bams", bams.join(" ")),
            ("outfile", quoted(outfile)),
        ],
    )?
    .threads(threads))
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    pipeline.add({
        let setup = setup.clone();
        Task::new("feature_count")
            .describe("Count reads in Ensembl genes with featureCounts")
            .follows(&["mapping"])
            .mkdir("read_counts.dir")
            .merge(FilePattern::new("bam.dir", r"^.+\.bam$")?, FEATURE_COUNTS)
            .body(move |ctx, job| {
                ctx.run(&feature_counts_statement(&setup, &job.inputs, job.output()?)?)
            })
    })?;

    pipeline.add(
        Task::new("load_feature_count")
            .describe("Load the featureCounts table into the database")
            .follows(&["feature_count"])
            .files(
                vec![PathBuf::from(FEATURE_COUNTS)],
                vec![PathBuf::from(FEATURE_COUNTS_LOAD)],
            )
            .body(load_body(setup, &[])),
    )?;

    pipeline.add(
        Task::new("readcounts")
            .describe("All read counting tasks")
            .follows(&["load_feature_count"]),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use lib_shared::config::Params;
    use lib_shared::run_mode::RunMode;

    use crate::pipeline::test_setup;

    fn bams() -> Vec<PathBuf> {
        vec![
            PathBuf::from("bam.dir/KO_1.bam"),
            PathBuf::from("bam.dir/WT_1.bam"),
        ]
    }

    #[test]
    fn test_paired_unstranded() {
        let statement = feature_counts_statement(
            &test_setup(false, false),
            &bams(),
            Path::new(FEATURE_COUNTS),
        )
        .unwrap();
        assert_eq!(statement.threads, 2);
        assert!(statement.text.contains("-T 2 -s 0 -Q 255 -t exon -g gene_id -p -a $gtf"));
        assert!(statement.text.contains("bam.dir/KO_1.bam bam.dir/WT_1.bam &&"));
        assert!(statement
            .text
            .contains("> read_counts.dir/featureCounts.txt && rm $tmp $gtf"));
    }

    #[test]
    fn test_single_reverse_stranded() {
        let params = Params::from_overlays(&[("test", "strandedness: RF\n")]).unwrap();
        let setup = Setup::new(
            params,
            RunMode {
                unpaired: true,
                stranded: true,
            },
        )
        .unwrap();
        let statement =
            feature_counts_statement(&setup, &bams(), Path::new(FEATURE_COUNTS)).unwrap();
        assert!(statement.text.contains("-s 2 -Q 255 -t exon -g gene_id -a $gtf"));
    }
}
