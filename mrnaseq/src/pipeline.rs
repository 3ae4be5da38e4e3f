/// Declaration of the mRNA-seq task graph.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use lib_pipeline::statement::{quote, render};
use lib_pipeline::{Context, Job, Pipeline, Result, ResultExt, Statement};
use lib_shared::config::Params;
use lib_shared::database::{self, Table};
use lib_shared::run_mode::RunMode;

use super::{coverage, mapping, readcounts, readquant, report, summarystats};

/// Everything the task bodies need besides their job.
#[derive(Clone, Debug)]
pub struct Setup {
    pub params: Params,
    /// Fixed for the whole run.
    pub mode: RunMode,
    /// SQLite database, relative to the working directory.
    pub db_path: PathBuf,
}

impl Setup {
    pub fn new(params: Params, mode: RunMode) -> Result<Self> {
        let db_path = params
            .database
            .path()
            .chain_err(|| "Invalid database configuration")?;
        Ok(Setup {
            params,
            mode,
            db_path,
        })
    }
}

/// Declare all tasks and check the resulting graph.
pub fn build(setup: Arc<Setup>) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new();
    mapping::register(&mut pipeline, &setup)?;
    readcounts::register(&mut pipeline, &setup)?;
    summarystats::register(&mut pipeline, &setup)?;
    readquant::register(&mut pipeline, &setup)?;
    coverage::register(&mut pipeline, &setup)?;
    report::register(&mut pipeline, &setup)?;
    pipeline.validate()?;
    Ok(pipeline)
}

/// Shell-quoted path.
pub fn quoted<P: AsRef<Path>>(path: P) -> String {
    quote(&path.as_ref().to_string_lossy())
}

/// Replace the suffix `from` of `path` by `to`.
pub fn with_suffix<P: AsRef<Path>>(path: P, from: &str, to: &str) -> Result<PathBuf> {
    let path = path.as_ref();
    let text = path.to_string_lossy();
    match text.strip_suffix(from) {
        Some(stem) => Ok(PathBuf::from(format!("{}{}", stem, to))),
        None => bail!("{} does not end in {}", path.display(), from),
    }
}

/// Render `template` into a statement.
pub fn statement(template: &str, values: &[(&str, String)]) -> Result<Statement> {
    let values: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();
    Ok(Statement::new(&render(template, &values)?))
}

/// Body loading the single input table of a job into the database; the output is the marker
/// file naming the table.
pub fn load_body(
    setup: &Arc<Setup>,
    indices: &'static [&'static str],
) -> impl Fn(&Context, &Job) -> Result<()> + Send + Sync + 'static {
    let setup = setup.clone();
    move |ctx, job| {
        let infile = job.input()?;
        let table = Table::read_tsv(ctx.path(infile))
            .chain_err(|| format!("Could not read {}", infile.display()))?;
        database::load_with_marker(
            &ctx.logger,
            ctx.path(&setup.db_path),
            &table,
            ctx.path(job.output()?),
            indices,
        )
        .chain_err(|| format!("Could not load {}", infile.display()))
    }
}

/// Stack `tables` with a leading `cat` column holding the first capture of `regex_filename`
/// and load the result under the name given by `marker`.
pub fn concatenate_and_load(
    ctx: &Context,
    setup: &Setup,
    tables: &[PathBuf],
    regex_filename: &str,
    cat: &str,
    indices: &[&str],
    marker: &Path,
) -> Result<()> {
    let re = Regex::new(regex_filename)
        .chain_err(|| format!("Invalid filename pattern {}", regex_filename))?;
    let paths: Vec<PathBuf> = tables.iter().map(|t| ctx.path(t)).collect();
    let table = Table::concatenate(&paths, &re, cat).chain_err(|| "Could not concatenate tables")?;
    info!(
        ctx.logger,
        "Concatenated {} tables into {} rows",
        tables.len(),
        table.rows.len()
    );
    database::load_with_marker(
        &ctx.logger,
        ctx.path(&setup.db_path),
        &table,
        ctx.path(marker),
        indices,
    )
    .chain_err(|| format!("Could not load {}", marker.display()))
}

/// Default configuration with the given run mode.
#[cfg(test)]
pub fn test_setup(unpaired: bool, stranded: bool) -> Arc<Setup> {
    let params = Params::from_overlays(&[]).unwrap();
    Arc::new(Setup::new(params, RunMode { unpaired, stranded }).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use slog::Logger;
    use tempdir::TempDir;

    use lib_pipeline::runner;

    fn names(tasks: &[&lib_pipeline::Task]) -> Vec<String> {
        tasks.iter().map(|t| t.name.clone()).collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_full_schedule() {
        let pipeline = build(test_setup(false, false)).unwrap();
        let order = names(&pipeline.schedule("full").unwrap());

        assert_eq!(order.len(), pipeline.tasks().len() - 1);
        assert!(!order.contains(&"report".to_string()));
        assert_eq!(order[0], "make_sample_info_table");
        assert_eq!(order.last().unwrap(), "full");
        for (before, after) in &[
            ("star_mapping", "index_bam"),
            ("star_mapping_se", "index_bam"),
            ("index_bam", "add_pseudo_sequence_quality"),
            ("mapping", "feature_count"),
            ("feature_count", "load_feature_count"),
            ("picard_rnaseq_metrics", "load_picard_rnaseq_metrics"),
            ("load_picard_rnaseq_metrics", "summarystats"),
            ("mapping", "salmon"),
            ("salmon_se", "load_salmon"),
            ("load_salmon", "salmon_gene_table"),
            ("readquant", "bam_coverage_rna"),
            ("coverage", "full"),
        ] {
            assert!(
                position(&order, before) < position(&order, after),
                "{} must run before {}",
                before,
                after
            );
        }

        let report = names(&pipeline.schedule("report").unwrap());
        assert_eq!(report.len(), pipeline.tasks().len());
    }

    #[test]
    fn test_variants_by_run_mode() {
        let active = |pipeline: &Pipeline, name: &str| pipeline.get(name).unwrap().active;

        let pipeline = build(test_setup(false, true)).unwrap();
        assert!(active(&pipeline, "star_mapping"));
        assert!(!active(&pipeline, "star_mapping_se"));
        assert!(active(&pipeline, "salmon"));
        assert!(!active(&pipeline, "salmon_se"));
        assert!(active(&pipeline, "picard_rnaseq_metrics"));
        assert!(active(&pipeline, "load_picard_rnaseq_metrics"));

        let pipeline = build(test_setup(true, false)).unwrap();
        assert!(!active(&pipeline, "star_mapping"));
        assert!(active(&pipeline, "star_mapping_se"));
        assert!(!active(&pipeline, "salmon"));
        assert!(active(&pipeline, "salmon_se"));
        assert!(!active(&pipeline, "picard_rnaseq_metrics"));
        assert!(!active(&pipeline, "load_picard_rnaseq_metrics"));
        assert!(active(&pipeline, "picard_alignment_summary"));
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix("data.dir/WT_1.fastq.1.gz", ".fastq.1.gz", ".fastq.2.gz").unwrap(),
            PathBuf::from("data.dir/WT_1.fastq.2.gz")
        );
        assert!(with_suffix("data.dir/WT_1.fastq.gz", ".fastq.1.gz", ".fastq.2.gz").is_err());
    }

    #[test]
    fn test_load_body() {
        let tmp_dir = TempDir::new("mrnaseq_pipeline").unwrap();
        let ctx = Context::new(Logger::root(slog::Discard, o!()), tmp_dir.path());
        fs::write(
            ctx.path("counts.txt"),
            "# Program:featureCounts\nGeneid\tLength\tWT_1\nG1\t100\t5\nG2\t200\t7\n",
        )
        .unwrap();
        let job = Job {
            inputs: vec![PathBuf::from("counts.txt")],
            outputs: vec![PathBuf::from("counts.load")],
        };

        load_body(&test_setup(false, false), &["Geneid"])(&ctx, &job).unwrap();
        assert!(ctx.path("counts.load").exists());
        let conn = database::open(ctx.path("csvdb")).unwrap();
        let total: i64 = conn
            .query_row("SELECT SUM(WT_1) FROM counts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 12);
    }

    #[test]
    fn test_make_sample_info_table() {
        let tmp_dir = TempDir::new("mrnaseq_pipeline").unwrap();
        let ctx = Context::new(Logger::root(slog::Discard, o!()), tmp_dir.path());
        fs::create_dir(ctx.path("data.dir")).unwrap();
        for name in &["WT_LPS_1.fastq.gz", "KO_LPS_1.fastq.gz"] {
            fs::write(ctx.path("data.dir").join(name), "").unwrap();
        }

        let pipeline = build(test_setup(true, false)).unwrap();
        runner::run(&pipeline, "make_sample_info_table", &ctx, 1).unwrap();
        let text = fs::read_to_string(ctx.path("sample_info.txt")).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "sample_id\tcondition\ttreatment\treplicate\tcategory"
        );
        assert!(text.contains("KO_LPS_1\tKO\tLPS\t1\tKO_LPS\n"));
    }
}
