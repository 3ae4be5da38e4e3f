/// Selection of task inputs by regular expression.
use std::path::{Path, PathBuf};

use regex::Regex;

use lib_shared::files;

use crate::errors::*;

/// Files in one directory whose names match a regular expression.
///
/// Paths are relative to the working directory of the pipeline.
#[derive(Clone, Debug)]
pub struct FilePattern {
    dir: PathBuf,
    regex: Regex,
}

impl FilePattern {
    pub fn new<P: Into<PathBuf>>(dir: P, pattern: &str) -> Result<Self> {
        Ok(FilePattern {
            dir: dir.into(),
            regex: Regex::new(pattern).chain_err(|| format!("Invalid pattern {}", pattern))?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Matching files as of now, sorted.
    pub fn matches(&self, workdir: &Path) -> Result<Vec<PathBuf>> {
        let found = files::list_matching(workdir.join(&self.dir), &self.regex)
            .chain_err(|| format!("Could not list {}", self.dir.display()))?;
        Ok(found
            .iter()
            .map(|path| self.dir.join(files::basename(path)))
            .collect())
    }

    /// Substitute the captures of the file name of `input` into `template`, e.g.,
    /// `star.dir/${1}.bam`.
    pub fn expand(&self, input: &Path, template: &str) -> PathBuf {
        let name = files::basename(input);
        PathBuf::from(self.regex.replace(&name, template).as_ref())
    }

    pub fn as_str(&self) -> String {
        format!("{}/{}", self.dir.display(), self.regex.as_str())
    }
}
