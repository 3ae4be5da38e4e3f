/// Loading of tab-separated tables into the SQLite database used for reporting.
use std::fs;
use std::path::Path;

use regex::Regex;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use separator::Separatable;

use slog::Logger;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use self::errors::*;

/// Values loaded as SQL `NULL`.
const NULL_VALUES: &[&str] = &["", "NA"];

/// SQL column type inferred from the values of a column.
#[derive(Clone, Copy, Debug, PartialEq, Display)]
pub enum ColumnType {
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "REAL")]
    Real,
    #[strum(serialize = "TEXT")]
    Text,
}

/// An in-memory table with a header line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Column names.
    pub header: Vec<String>,
    /// Rows, each with one value per header column.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Table {
            header,
            rows: Vec::new(),
        }
    }

    /// Read a tab-separated file; lines starting with `#` are comments, short rows are padded
    /// and rows longer than the header are rejected.
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .quoting(false)
            .from_path(path)
            .chain_err(|| format!("Could not open {}", path.display()))?;

        let header: Vec<String> = reader
            .headers()
            .chain_err(|| format!("Could not read header of {}", path.display()))?
            .iter()
            .map(|s| s.to_string())
            .collect();
        if header.is_empty() || header.iter().all(|s| s.is_empty()) {
            bail!("Table {} has no header", path.display());
        }

        let mut table = Table::new(header);
        for record in reader.records() {
            let record = record.chain_err(|| format!("Problem reading {}", path.display()))?;
            if record.len() > table.header.len() {
                bail!(
                    "Row at line {} of {} has {} fields but the header has {}",
                    record.position().map(|p| p.line()).unwrap_or(0),
                    path.display(),
                    record.len(),
                    table.header.len()
                );
            }
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(table.header.len(), String::new());
            table.rows.push(row);
        }

        Ok(table)
    }

    /// Write as tab-separated file with header.
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)
            .chain_err(|| format!("Could not open {} for writing", path.display()))?;
        writer
            .write_record(&self.header)
            .chain_err(|| "Could not write header")?;
        for row in &self.rows {
            writer.write_record(row).chain_err(|| "Could not write row")?;
        }
        writer
            .flush()
            .chain_err(|| format!("Could not flush {}", path.display()))
    }

    /// Stack the tables in `paths` and prepend a column `cat` holding the first capture of
    /// `regex_filename` applied to each path.
    pub fn concatenate<P: AsRef<Path>>(paths: &[P], regex_filename: &Regex, cat: &str) -> Result<Self> {
        let mut result: Option<Table> = None;
        for path in paths {
            let path = path.as_ref();
            let name = path.to_string_lossy();
            let track = regex_filename
                .captures(&name)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| {
                    Error::from(format!("{} does not match {}", name, regex_filename.as_str()))
                })?;

            let table = Self::read_tsv(path)?;
            let result = result.get_or_insert_with(|| {
                let mut header = vec![cat.to_string()];
                header.extend(table.header.iter().cloned());
                Table::new(header)
            });
            if result.header[1..] != table.header[..] {
                bail!("Header of {} differs from the previous tables", path.display());
            }
            for row in table.rows {
                let mut new_row = vec![track.clone()];
                new_row.extend(row);
                result.rows.push(new_row);
            }
        }

        match result {
            Some(table) => Ok(table),
            None => bail!("No tables to concatenate"),
        }
    }

    /// Infer the SQL type of column `col`.
    pub fn column_type(&self, col: usize) -> ColumnType {
        let values = self
            .rows
            .iter()
            .map(|row| row[col].as_str())
            .filter(|v| !NULL_VALUES.contains(v));
        let mut result = ColumnType::Integer;
        for value in values {
            if result == ColumnType::Integer && value.parse::<i64>().is_err() {
                result = ColumnType::Real;
            }
            if result == ColumnType::Real && value.parse::<f64>().is_err() {
                return ColumnType::Text;
            }
        }
        result
    }
}

/// Convert a single value according to the column type.
fn to_sql_value(value: &str, column_type: ColumnType) -> Value {
    if NULL_VALUES.contains(&value) {
        return Value::Null;
    }
    match column_type {
        ColumnType::Integer => value.parse().map(Value::Integer).unwrap_or(Value::Null),
        ColumnType::Real => value.parse().map(Value::Real).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(value.to_string()),
    }
}

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name for a file: basename up to the first `.`, with `-` replaced by `_`.
pub fn table_name<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    name.split('.').next().unwrap_or("").replace('-', "_")
}

/// Open (or create) the SQLite database at `path`.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    Connection::open(path).chain_err(|| format!("Could not open database {}", path.display()))
}

/// Attach the existing database at `path` under `alias`.
pub fn attach<P: AsRef<Path>>(conn: &Connection, path: P, alias: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        bail!("can't find database '{}'", path.display());
    }
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", quote_ident(alias)),
        [path.to_string_lossy().to_string()],
    )
    .chain_err(|| format!("Could not attach {}", path.display()))?;
    Ok(())
}

/// Load `table` into the database as `name`, replacing any existing table of that name, and
/// create an index for each column in `indices`.
///
/// Returns the number of rows loaded.
pub fn load_table(
    logger: &Logger,
    conn: &mut Connection,
    name: &str,
    table: &Table,
    indices: &[&str],
) -> Result<usize> {
    let types: Vec<ColumnType> = (0..table.header.len())
        .map(|col| table.column_type(col))
        .collect();
    let columns: Vec<String> = table
        .header
        .iter()
        .zip(types.iter())
        .map(|(col, t)| format!("{} {}", quote_ident(col), t))
        .collect();
    debug!(logger, "Creating table {} ({})", name, columns.join(", "));

    let tx = conn
        .transaction()
        .chain_err(|| "Could not start transaction")?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])
        .chain_err(|| format!("Could not drop table {}", name))?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", ")),
        [],
    )
    .chain_err(|| format!("Could not create table {}", name))?;
    {
        let placeholders: Vec<String> = (1..=table.header.len()).map(|i| format!("?{}", i)).collect();
        let mut insert = tx
            .prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_ident(name),
                placeholders.join(", ")
            ))
            .chain_err(|| "Could not prepare insert")?;
        for row in &table.rows {
            let values = row
                .iter()
                .zip(types.iter())
                .map(|(v, t)| to_sql_value(v, *t));
            insert
                .execute(params_from_iter(values))
                .chain_err(|| format!("Could not insert into {}", name))?;
        }
    }
    for column in indices {
        if !table.header.iter().any(|c| c == column) {
            bail!("Cannot index {}: no column {}", name, column);
        }
        tx.execute(
            &format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&format!("{}_{}", name, column)),
                quote_ident(name),
                quote_ident(column)
            ),
            [],
        )
        .chain_err(|| format!("Could not create index on {}.{}", name, column))?;
    }
    tx.commit().chain_err(|| "Could not commit")?;

    info!(
        logger,
        "Loaded {} rows into table {}",
        table.rows.len().separated_string(),
        name
    );
    Ok(table.rows.len())
}

/// Load `table` into the database at `db_path` under the table name derived from `marker` and
/// write the marker file recording the load.
pub fn load_with_marker<P: AsRef<Path>, Q: AsRef<Path>>(
    logger: &Logger,
    db_path: P,
    table: &Table,
    marker: Q,
    indices: &[&str],
) -> Result<()> {
    let marker = marker.as_ref();
    let name = table_name(marker);
    let mut conn = open(db_path)?;
    let rows = load_table(logger, &mut conn, &name, table, indices)?;
    fs::write(marker, format!("table\t{}\nrows\t{}\n", name, rows))
        .chain_err(|| format!("Could not write {}", marker.display()))
}
