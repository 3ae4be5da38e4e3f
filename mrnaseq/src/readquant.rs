/// Transcript quantification with Salmon and the per-gene TPM table.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slog::Logger;

use lib_pipeline::{FilePattern, Pipeline, Result, ResultExt, Statement, Task};
use lib_shared::database::{self, Table};
use lib_shared::run_mode::PAIRED_SUFFIX;

use super::pipeline::{concatenate_and_load, load_body, quoted, statement, with_suffix, Setup};
use super::statements;

pub const SALMON_LOAD: &str = "salmon.dir/salmon.load";
pub const SALMON_GENES: &str = "salmon.dir/salmon_genes.txt";
pub const SALMON_GENES_LOAD: &str = "salmon.dir/salmon_genes.load";

/// Alias of the attached annotation database.
const ANNOTATION_ALIAS: &str = "anndb";

/// Salmon quantification of one sample, writing its log to `outfile` and the quantification
/// next to it.
pub fn salmon_statement(setup: &Setup, read1: &Path, outfile: &Path) -> Result<Statement> {
    let params = &setup.params;
    let mut values = vec![
        ("index", quoted(&params.salmon.index)),
        ("threads", params.salmon.threads.to_string()),
        ("libtype", quoted(&params.salmon.libtype)),
        ("outname", quoted(with_suffix(outfile, ".log", "")?)),
        ("outfile", quoted(outfile)),
    ];
    let mut template = String::new();
    if let Some(ref version) = params.salmon.version {
        template.push_str(statements::SALMON_MODULE);
        template.push('\n');
        values.push(("version", version.clone()));
    }
    if setup.mode.unpaired {
        template.push_str(statements::SALMON_SINGLE);
        values.push(("infile", quoted(read1)));
    } else {
        template.push_str(statements::SALMON_PAIRED);
        values.push(("read1", quoted(read1)));
        values.push((
            "read2",
            quoted(with_suffix(read1, PAIRED_SUFFIX, ".fastq.2.gz")?),
        ));
    }
    Ok(statement(&template, &values)?.threads(params.salmon.threads))
}

/// Sum the TPMs of the transcripts of each gene per sample and pivot to one row per gene and
/// one column per sample.
///
/// `table` is the Salmon table in the database at `db_path`; the transcript to gene mapping
/// comes from `anndb_table` in the annotation database `anndb`.  Samples without transcripts
/// of a gene get an empty value.
pub fn gene_tpm_table(
    logger: &Logger,
    db_path: &Path,
    table: &str,
    anndb: &Path,
    anndb_table: &str,
) -> Result<Table> {
    let conn = database::open(db_path).chain_err(|| "Could not open database")?;
    database::attach(&conn, anndb, ANNOTATION_ALIAS)
        .chain_err(|| "Could not attach annotation database")?;

    let sql = format!(
        "SELECT CAST(t.sample_id AS TEXT), CAST(i.gene_id AS TEXT), TOTAL(t.TPM) \
         FROM \"{}\" t INNER JOIN {}.\"{}\" i ON t.Name = i.transcript_id \
         GROUP BY i.gene_id, t.sample_id",
        table, ANNOTATION_ALIAS, anndb_table
    );
    debug!(logger, "{}", sql);
    let mut stmt = conn
        .prepare(&sql)
        .chain_err(|| format!("Could not query TPMs from {}", table))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })
        .chain_err(|| format!("Could not query TPMs from {}", table))?;

    let mut samples = BTreeSet::new();
    let mut genes: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        let (sample, gene, tpm) = row.chain_err(|| "Problem reading TPMs")?;
        samples.insert(sample.clone());
        genes.entry(gene).or_default().insert(sample, tpm);
    }

    let mut header = vec!["gene_id".to_string()];
    header.extend(samples.iter().cloned());
    let mut result = Table::new(header);
    for (gene, tpms) in genes {
        let mut row = vec![gene];
        row.extend(
            samples
                .iter()
                .map(|s| tpms.get(s).map(|tpm| tpm.to_string()).unwrap_or_default()),
        );
        result.rows.push(row);
    }
    info!(
        logger,
        "TPMs of {} genes in {} samples",
        result.rows.len(),
        samples.len()
    );
    Ok(result)
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    let input_dir = setup.params.input_dir.clone();

    let salmon_body = {
        let setup = setup.clone();
        move |ctx: &lib_pipeline::Context, job: &lib_pipeline::Job| -> Result<()> {
            ctx.run(&salmon_statement(&setup, job.input()?, job.output()?)?)
        }
    };
    pipeline.add(
        Task::new("salmon")
            .describe("Quantify paired-end reads with Salmon")
            .follows(&["mapping"])
            .mkdir("salmon.dir")
            .active_if(setup.mode.paired())
            .transform(
                FilePattern::new(&input_dir, r"^(.+)\.fastq\.1\.gz$")?,
                &["salmon.dir/${1}.log"],
            )
            .body(salmon_body.clone()),
    )?;
    pipeline.add(
        Task::new("salmon_se")
            .describe("Quantify single-end reads with Salmon")
            .follows(&["mapping"])
            .mkdir("salmon.dir")
            .active_if(setup.mode.unpaired)
            .transform(
                FilePattern::new(&input_dir, r"^(.+)\.fastq\.gz$")?,
                &["salmon.dir/${1}.log"],
            )
            .body(salmon_body),
    )?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("load_salmon")
            .describe("Load the Salmon quantifications into a single table")
            .follows(&["salmon", "salmon_se"])
            .merge(FilePattern::new("salmon.dir", r"^.+\.log$")?, SALMON_LOAD)
            .body(move |ctx, job| {
                let tables = job
                    .inputs
                    .iter()
                    .map(|log| with_suffix(log, ".log", "/quant.sf"))
                    .collect::<Result<Vec<PathBuf>>>()?;
                debug!(ctx.logger, "Memory for loading: {}", setup.params.sql.himem);
                concatenate_and_load(
                    ctx,
                    &setup,
                    &tables,
                    r"([^/]+)/quant\.sf$",
                    "sample_id",
                    &["Name"],
                    job.output()?,
                )
            })
    })?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("salmon_gene_table")
            .describe("Prepare the per-gene TPM table")
            .follows(&["load_salmon"])
            .files(
                vec![PathBuf::from(SALMON_LOAD)],
                vec![PathBuf::from(SALMON_GENES)],
            )
            .body(move |ctx, job| {
                let annotations = &setup.params.annotations;
                let table = gene_tpm_table(
                    &ctx.logger,
                    &ctx.path(&setup.db_path),
                    &database::table_name(job.input()?),
                    &ctx.path(&annotations.database),
                    &annotations.dbtable,
                )?;
                table
                    .write_tsv(ctx.path(job.output()?))
                    .chain_err(|| "Could not write gene table")
            })
    })?;

    pipeline.add(
        Task::new("load_salmon_gene_table")
            .describe("Load the per-gene TPM table into the database")
            .follows(&["salmon_gene_table"])
            .files(
                vec![PathBuf::from(SALMON_GENES)],
                vec![PathBuf::from(SALMON_GENES_LOAD)],
            )
            .body(load_body(setup, &["gene_id"])),
    )?;

    pipeline.add(
        Task::new("readquant")
            .describe("All quantification tasks")
            .follows(&["load_salmon_gene_table"]),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rusqlite::Connection;
    use tempdir::TempDir;

    use lib_shared::config::Params;
    use lib_shared::run_mode::RunMode;

    use crate::pipeline::test_setup;

    #[test]
    fn test_salmon_paired() {
        let statement = salmon_statement(
            &test_setup(false, false),
            Path::new("data.dir/WT_1.fastq.1.gz"),
            Path::new("salmon.dir/WT_1.log"),
        )
        .unwrap();
        assert_eq!(statement.threads, 8);
        assert!(statement.text.starts_with("salmon quant -i "));
        assert!(statement.text.ends_with(
            "-p 8 -l A -1 data.dir/WT_1.fastq.1.gz -2 data.dir/WT_1.fastq.2.gz \
             -o salmon.dir/WT_1 &> salmon.dir/WT_1.log"
        ));
    }

    #[test]
    fn test_salmon_single_with_module() {
        let params = Params::from_overlays(&[(
            "test",
            "salmon:\n  index: /ref/salmon\n  version: 1.4.0\n",
        )])
        .unwrap();
        let setup = Setup::new(
            params,
            RunMode {
                unpaired: true,
                stranded: false,
            },
        )
        .unwrap();
        let statement = salmon_statement(
            &setup,
            Path::new("data.dir/WT_1.fastq.gz"),
            Path::new("salmon.dir/WT_1.log"),
        )
        .unwrap();
        assert!(statement
            .text
            .starts_with("module switch bio/salmon/0.11.3 bio/salmon/1.4.0 && salmon quant"));
        assert!(statement.text.contains("-i /ref/salmon"));
        assert!(statement.text.contains("-r data.dir/WT_1.fastq.gz -o salmon.dir/WT_1"));
    }

    #[test]
    fn test_gene_tpm_table() {
        let tmp_dir = TempDir::new("mrnaseq_readquant").unwrap();
        let db_path = tmp_dir.path().join("csvdb");
        let anndb = tmp_dir.path().join("annotations.db");

        let conn = Connection::open(&anndb).unwrap();
        conn.execute_batch(
            "CREATE TABLE transcript_info (transcript_id TEXT, gene_id TEXT);
             INSERT INTO transcript_info VALUES ('T1', 'G1'), ('T2', 'G1'), ('T3', 'G2');",
        )
        .unwrap();
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE salmon (sample_id TEXT, Name TEXT, TPM REAL);
             INSERT INTO salmon VALUES
               ('WT_1', 'T1', 1.5), ('WT_1', 'T2', 2.0), ('WT_1', 'T3', 4.0),
               ('KO_1', 'T1', 3.0), ('KO_1', 'T9', 7.0);",
        )
        .unwrap();

        let logger = Logger::root(slog::Discard, o!());
        let table = gene_tpm_table(&logger, &db_path, "salmon", &anndb, "transcript_info").unwrap();
        assert_eq!(table.header, vec!["gene_id", "KO_1", "WT_1"]);
        assert_eq!(table.rows[0], vec!["G1", "3", "3.5"]);
        assert_eq!(table.rows[1], vec!["G2", "", "4"]);

        let missing = tmp_dir.path().join("missing.db");
        assert!(gene_tpm_table(&logger, &db_path, "salmon", &missing, "transcript_info").is_err());
    }
}
