/// Options for the "mrnaseq" commands.
use std::path::PathBuf;

use clap::ArgMatches;

/// Options shared by all commands.
#[derive(Clone, Debug)]
pub struct GlobalOptions {
    /// Explicit configuration file, applied last.
    pub config: Option<PathBuf>,
    /// Directory all tasks run in.
    pub workdir: PathBuf,
}

impl GlobalOptions {
    /// Build options from ArgMatches.
    pub fn new(matches: &ArgMatches) -> Self {
        Self {
            config: matches.value_of("config").map(PathBuf::from),
            workdir: PathBuf::from(matches.value_of("workdir").unwrap_or(".")),
        }
    }
}

/// Options for "mrnaseq show" and "mrnaseq plot".
#[derive(Clone, Debug)]
pub struct TargetOptions {
    pub target: String,
}

impl TargetOptions {
    /// Build options from ArgMatches.
    pub fn new(matches: &ArgMatches) -> Self {
        Self {
            target: matches.value_of("task").unwrap_or("full").to_string(),
        }
    }
}

/// Options for "mrnaseq make".
#[derive(Clone, Debug)]
pub struct MakeOptions {
    pub target: String,
    /// Number of jobs run in parallel.
    pub jobs: usize,
    pub force: bool,
}

impl MakeOptions {
    /// Build options from ArgMatches.
    pub fn new(matches: &ArgMatches) -> Self {
        Self {
            target: matches.value_of("task").unwrap_or("full").to_string(),
            jobs: value_t!(matches, "jobs", usize).unwrap_or_else(|e| e.exit()),
            force: matches.is_present("force"),
        }
    }
}
