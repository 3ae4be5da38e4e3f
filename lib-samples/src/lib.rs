//! Construction of the sample information table from the input file names.
//!
//! File names look like `<prefix>.fastq.1.gz`; the prefix is the sample identifier and is split
//! on underscores into the experimental factors.  The table gets a `category` column joining
//! all factors but the replicate, for use in the design of downstream differential expression.

#[macro_use]
extern crate error_chain;

#[macro_use]
extern crate slog;

use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;

use slog::Logger;

use lib_shared::database::{self, Table};
use lib_shared::files;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {
        errors {
            NoSamples {
                description("no input files")
                display("no input files to derive samples from")
            }
            MalformedName(sample_id: String, tokens: usize) {
                description("unsupported sample name")
                display("sample name {} has {} underscore-delimited tokens, expected 2 to 4",
                        sample_id, tokens)
            }
            MixedSchemas(sample_id: String, tokens: usize, expected: usize) {
                description("sample names with different numbers of tokens")
                display("sample name {} has {} tokens but previous names had {}",
                        sample_id, tokens, expected)
            }
        }
    }
}

pub use errors::*;

/// Name of the table in the database and basis for the TSV file name.
pub const TABLE_NAME: &str = "sample_info";

/// Name of the derived category column.
pub const CATEGORY: &str = "category";

/// Columns that do not contribute to the category.
const NON_FACTOR_COLUMNS: &[&str] = &["sample_id", "replicate"];

/// Column layout, selected by the number of tokens in the sample names.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Schema {
    /// `condition_replicate`
    Condition,
    /// `condition_treatment_replicate`
    ConditionTreatment,
    /// `group_condition_treatment_replicate`
    GroupConditionTreatment,
}

impl Schema {
    pub fn from_token_count(tokens: usize) -> Option<Self> {
        match tokens {
            2 => Some(Schema::Condition),
            3 => Some(Schema::ConditionTreatment),
            4 => Some(Schema::GroupConditionTreatment),
            _ => None,
        }
    }

    pub fn token_count(&self) -> usize {
        self.columns().len() - 1
    }

    /// Column names, starting with `sample_id`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Schema::Condition => &["sample_id", "condition", "replicate"],
            Schema::ConditionTreatment => &["sample_id", "condition", "treatment", "replicate"],
            Schema::GroupConditionTreatment => {
                &["sample_id", "group", "condition", "treatment", "replicate"]
            }
        }
    }
}

/// Sample identifier of an input file: its basename up to the first dot.
pub fn sample_id<P: AsRef<Path>>(path: P) -> String {
    files::basename(path.as_ref())
        .split('.')
        .next()
        .unwrap_or("")
        .to_string()
}

/// One row of the sample table.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub sample_id: String,
    /// Factor values in schema column order.
    pub factors: Vec<String>,
}

impl SampleRecord {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let sample_id = sample_id(path);
        let factors = sample_id.split('_').map(|s| s.to_string()).collect();
        SampleRecord { sample_id, factors }
    }

    /// Underscore-joined factor values except the replicate.
    pub fn category(&self, schema: Schema) -> String {
        schema.columns()[1..]
            .iter()
            .zip(self.factors.iter())
            .filter(|(col, _)| !NON_FACTOR_COLUMNS.contains(*col))
            .map(|(_, value)| value.as_str())
            .collect::<Vec<&str>>()
            .join("_")
    }
}

/// The sample table, one record per distinct sample identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleTable {
    pub schema: Schema,
    pub records: Vec<SampleRecord>,
}

impl SampleTable {
    /// Build from input file paths.
    ///
    /// All names must split into the same supported number of tokens, otherwise no table is
    /// built at all.  The first file of a sample identifier wins.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut schema: Option<Schema> = None;
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for path in paths {
            let record = SampleRecord::from_path(path);
            let tokens = record.factors.len();
            let this_schema = match Schema::from_token_count(tokens) {
                Some(s) => s,
                None => bail!(ErrorKind::MalformedName(record.sample_id, tokens)),
            };
            match schema {
                Some(s) if s != this_schema => bail!(ErrorKind::MixedSchemas(
                    record.sample_id,
                    tokens,
                    s.token_count()
                )),
                _ => schema = Some(this_schema),
            }

            if seen.insert(record.sample_id.clone()) {
                records.push(record);
            }
        }

        match schema {
            Some(schema) => Ok(SampleTable { schema, records }),
            None => bail!(ErrorKind::NoSamples),
        }
    }

    /// Column names including the trailing category column.
    pub fn columns(&self) -> Vec<String> {
        self.schema
            .columns()
            .iter()
            .map(|s| s.to_string())
            .chain(Some(CATEGORY.to_string()))
            .collect()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(self.columns());
        for record in &self.records {
            let mut row = vec![record.sample_id.clone()];
            row.extend(record.factors.iter().cloned());
            row.push(record.category(self.schema));
            table.rows.push(row);
        }
        table
    }

    /// Write as tab-separated file with header and without index column.
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_table()
            .write_tsv(path)
            .chain_err(|| "Could not write sample table")
    }

    /// Store in the database, replacing an existing table.
    pub fn to_sql(&self, logger: &Logger, conn: &mut Connection) -> Result<usize> {
        database::load_table(logger, conn, TABLE_NAME, &self.to_table(), &[])
            .chain_err(|| "Could not load sample table into database")
    }
}

/// Build the sample table from the reads in `input_dir`, store it in the database at `db_path`
/// and write it to `outfile`.
///
/// Unsupported sample names disable the table for the whole batch: a warning is logged,
/// nothing is written and `Ok(false)` is returned.
pub fn make_sample_info_table<P, Q, R>(
    logger: &Logger,
    input_dir: P,
    outfile: Q,
    db_path: R,
) -> Result<bool>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let paths = files::list_inputs(input_dir).chain_err(|| "Could not list input files")?;
    let table = match SampleTable::from_paths(&paths) {
        Ok(table) => table,
        Err(e) => match e.kind() {
            ErrorKind::NoSamples | ErrorKind::MalformedName(..) | ErrorKind::MixedSchemas(..) => {
                warn!(logger, "Not building sample table: {}", e);
                warn!(
                    logger,
                    "Please reformat sample names according to pipeline documentation"
                );
                return Ok(false);
            }
            _ => return Err(e),
        },
    };
    info!(
        logger,
        "Found {} samples with columns {:?}",
        table.records.len(),
        table.columns()
    );

    let mut conn = database::open(db_path).chain_err(|| "Could not open database")?;
    table.to_sql(logger, &mut conn)?;
    table.write_tsv(outfile)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::PathBuf;

    use tempdir::TempDir;

    fn logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| PathBuf::from("data.dir").join(n))
            .collect()
    }

    #[test]
    fn test_two_tokens() {
        let table =
            SampleTable::from_paths(&paths(&["A_1.fastq.1.gz", "A_2.fastq.1.gz"])).unwrap();
        assert_eq!(table.schema, Schema::Condition);
        assert_eq!(
            table.columns(),
            vec!["sample_id", "condition", "replicate", "category"]
        );
        let t = table.to_table();
        assert_eq!(t.rows[0], vec!["A_1", "A", "1", "A"]);
        assert_eq!(t.rows[1], vec!["A_2", "A", "2", "A"]);
    }

    #[test]
    fn test_category() {
        let table = SampleTable::from_paths(&paths(&["G1_WT_LPS_3.fastq.gz"])).unwrap();
        assert_eq!(table.schema, Schema::GroupConditionTreatment);
        assert_eq!(table.records[0].category(table.schema), "G1_WT_LPS");

        let table = SampleTable::from_paths(&paths(&["WT_LPS_3.fastq.gz"])).unwrap();
        assert_eq!(table.records[0].category(table.schema), "WT_LPS");
    }

    #[test]
    fn test_deduplicates_first_wins() {
        let table = SampleTable::from_paths(&paths(&[
            "KO_1.fastq.1.gz",
            "KO_1.fastq.2.gz",
            "WT_1.fastq.1.gz",
            "WT_1.fastq.2.gz",
        ]))
        .unwrap();
        let ids: Vec<&str> = table.records.iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["KO_1", "WT_1"]);
    }

    #[test]
    fn test_rejects_bad_names() {
        match SampleTable::from_paths(&paths(&["A_1.fastq.gz", "A.fastq.gz"])) {
            Err(Error(ErrorKind::MalformedName(id, 1), _)) => assert_eq!(id, "A"),
            other => panic!("unexpected {:?}", other),
        }
        match SampleTable::from_paths(&paths(&["G_A_B_1.fastq.gz", "A_1.fastq.gz"])) {
            Err(Error(ErrorKind::MixedSchemas(_, 2, 4), _)) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(SampleTable::from_paths(&paths(&["a_b_c_d_e.fastq.gz"])).is_err());
        assert!(SampleTable::from_paths(&Vec::<PathBuf>::new()).is_err());
    }

    #[test]
    fn test_make_sample_info_table() {
        let tmp_dir = TempDir::new("mrnaseq_samples").unwrap();
        let data_dir = tmp_dir.path().join("data.dir");
        fs::create_dir(&data_dir).unwrap();
        for name in &["WT_1.fastq.1.gz", "WT_1.fastq.2.gz", "KO_2.fastq.1.gz"] {
            fs::write(data_dir.join(name), "").unwrap();
        }
        let outfile = tmp_dir.path().join("sample_info.txt");
        let db_path = tmp_dir.path().join("csvdb");

        assert!(make_sample_info_table(&logger(), &data_dir, &outfile, &db_path).unwrap());
        assert_eq!(
            fs::read_to_string(&outfile).unwrap(),
            "sample_id\tcondition\treplicate\tcategory\nKO_2\tKO\t2\tKO\nWT_1\tWT\t1\tWT\n"
        );

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sample_info", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_mixed_batch_writes_nothing() {
        let tmp_dir = TempDir::new("mrnaseq_samples").unwrap();
        let data_dir = tmp_dir.path().join("data.dir");
        fs::create_dir(&data_dir).unwrap();
        for name in &["G_WT_LPS_1.fastq.gz", "WT_1.fastq.gz"] {
            fs::write(data_dir.join(name), "").unwrap();
        }
        let outfile = tmp_dir.path().join("sample_info.txt");
        let db_path = tmp_dir.path().join("csvdb");

        assert!(!make_sample_info_table(&logger(), &data_dir, &outfile, &db_path).unwrap());
        assert!(!outfile.exists());
        assert!(!db_path.exists());
    }
}
