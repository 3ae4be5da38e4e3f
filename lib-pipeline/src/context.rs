/// Execution context handed to the task bodies.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use slog::Logger;

use crate::errors::*;
use crate::statement::Statement;
use crate::task::Job;

#[derive(Clone)]
pub struct Context {
    /// Logger, carrying the current task name inside task bodies.
    pub logger: Logger,
    /// Directory all task paths are relative to.
    pub workdir: PathBuf,
    /// Rerun jobs even if their outputs are up to date.
    pub force: bool,
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Context {
    pub fn new<P: Into<PathBuf>>(logger: Logger, workdir: P) -> Self {
        Context {
            logger,
            workdir: workdir.into(),
            force: false,
        }
    }

    /// Child context whose log lines carry `task`.
    pub fn for_task(&self, task: &str) -> Self {
        Context {
            logger: self.logger.new(o!("task" => task.to_string())),
            workdir: self.workdir.clone(),
            force: self.force,
        }
    }

    /// Resolve a task path against the working directory.
    pub fn path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.workdir.join(path)
    }

    /// Run a statement in the working directory.
    pub fn run(&self, statement: &Statement) -> Result<()> {
        statement.run(&self.logger, &self.workdir)
    }

    /// A job is up to date when all of its outputs exist and none is older than its newest
    /// input.  Jobs without outputs are never up to date.
    pub fn is_up_to_date(&self, job: &Job) -> bool {
        if self.force || job.outputs.is_empty() {
            return false;
        }

        let mut oldest_output: Option<SystemTime> = None;
        for output in &job.outputs {
            match modified(&self.path(output)) {
                Some(t) => oldest_output = Some(oldest_output.map_or(t, |o| o.min(t))),
                None => return false,
            }
        }

        let mut newest_input: Option<SystemTime> = None;
        for input in &job.inputs {
            match modified(&self.path(input)) {
                Some(t) => newest_input = Some(newest_input.map_or(t, |i| i.max(t))),
                None => return false,
            }
        }

        match (oldest_output, newest_input) {
            (Some(output), Some(input)) => output >= input,
            _ => true,
        }
    }
}
