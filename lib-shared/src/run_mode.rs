/// Detection of the process-wide run mode (paired/single-end, stranded/unstranded).
use std::fmt;
use std::path::Path;

use super::config::Strandedness;
use super::files;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use self::errors::*;

/// Suffix of the first mate file of paired-end reads.
pub const PAIRED_SUFFIX: &str = ".fastq.1.gz";

/// Returns `true` if none of `names` carries the paired-end suffix.
///
/// This is a decision for the whole batch, single files are not inspected individually.
pub fn is_unpaired<I, S>(names: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    !names
        .into_iter()
        .any(|name| name.as_ref().ends_with(PAIRED_SUFFIX))
}

/// Flags fixing which task variants run; computed once and never changed afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunMode {
    /// No paired-end input was found.
    pub unpaired: bool,
    /// The library is stranded.
    pub stranded: bool,
}

impl RunMode {
    /// Inspect the input files in `input_dir`.
    pub fn detect<P: AsRef<Path>>(input_dir: P, strandedness: Strandedness) -> Result<Self> {
        let inputs = files::list_inputs(&input_dir).chain_err(|| "Could not list input files")?;
        Ok(RunMode {
            unpaired: is_unpaired(inputs.iter().map(|p| files::basename(p))),
            stranded: strandedness.is_stranded(),
        })
    }

    pub fn paired(&self) -> bool {
        !self.unpaired
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {}",
            if self.unpaired { "single-end" } else { "paired-end" },
            if self.stranded { "stranded" } else { "unstranded" }
        )
    }
}
