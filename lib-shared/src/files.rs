/// Listing of files in the pipeline's working directories.
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use self::errors::*;

/// Pattern selecting the input read files (`*fastq*gz`).
pub const INPUT_PATTERN: &str = r"fastq.*gz$";

/// List files in `dir` whose name matches `re`, sorted by path.
///
/// A missing directory yields no files, just like an unmatched glob.
pub fn list_matching<P: AsRef<Path>>(dir: P, re: &Regex) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();
    for entry in fs::read_dir(dir).chain_err(|| format!("Could not list {}", dir.display()))? {
        let entry = entry.chain_err(|| format!("Could not list {}", dir.display()))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| re.is_match(name))
            .unwrap_or(false);
        if matches && path.is_file() {
            result.push(path);
        }
    }
    result.sort();

    Ok(result)
}

/// List the input read files in `dir`.
pub fn list_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let re = Regex::new(INPUT_PATTERN).chain_err(|| "Invalid input pattern")?;
    list_matching(dir, &re)
}

/// The file name of `path` as a string, empty if there is none.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
