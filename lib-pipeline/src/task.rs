/// Declaration of a single task.
use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::errors::*;
use crate::pattern::FilePattern;

/// Code run for each job of a task.
pub type Body = Box<dyn Fn(&Context, &Job) -> Result<()> + Send + Sync>;

/// One unit of work of a task.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Job {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

impl Job {
    /// The single input of a per-file job.
    pub fn input(&self) -> Result<&Path> {
        match self.inputs.first() {
            Some(p) => Ok(p),
            None => bail!("Job has no input"),
        }
    }

    /// The first output of a job.
    pub fn output(&self) -> Result<&Path> {
        match self.outputs.first() {
            Some(p) => Ok(p),
            None => bail!("Job has no output"),
        }
    }
}

/// How the jobs of a task are derived.
#[derive(Debug)]
pub enum Inputs {
    /// No files; a single job, e.g., for tasks that only group their predecessors.
    Nothing,
    /// A single job with fixed inputs and outputs.
    Files {
        inputs: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
    },
    /// One job per matching file, outputs from templates over the captures of the file name.
    Transform {
        pattern: FilePattern,
        outputs: Vec<String>,
    },
    /// One job over all matching files.
    Merge {
        pattern: FilePattern,
        output: PathBuf,
    },
}

pub struct Task {
    pub name: String,
    pub description: String,
    /// Names of the tasks that must complete first.
    pub follows: Vec<String>,
    /// Directories created before the first job runs.
    pub mkdirs: Vec<PathBuf>,
    /// Inactive tasks are skipped but count as complete for their dependents.
    pub active: bool,
    pub inputs: Inputs,
    body: Option<Body>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("follows", &self.follows)
            .field("active", &self.active)
            .field("inputs", &self.inputs)
            .finish()
    }
}

impl Task {
    pub fn new(name: &str) -> Self {
        Task {
            name: name.to_string(),
            description: String::new(),
            follows: Vec::new(),
            mkdirs: Vec::new(),
            active: true,
            inputs: Inputs::Nothing,
            body: None,
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn follows(mut self, names: &[&str]) -> Self {
        self.follows.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn mkdir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.mkdirs.push(dir.into());
        self
    }

    pub fn active_if(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn files(mut self, inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Self {
        self.inputs = Inputs::Files { inputs, outputs };
        self
    }

    /// A single job without inputs creating `output`.
    pub fn originate<P: Into<PathBuf>>(self, output: P) -> Self {
        self.files(Vec::new(), vec![output.into()])
    }

    pub fn transform(mut self, pattern: FilePattern, outputs: &[&str]) -> Self {
        self.inputs = Inputs::Transform {
            pattern,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    pub fn merge<P: Into<PathBuf>>(mut self, pattern: FilePattern, output: P) -> Self {
        self.inputs = Inputs::Merge {
            pattern,
            output: output.into(),
        };
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&Context, &Job) -> Result<()> + Send + Sync + 'static,
    {
        self.body = Some(Box::new(body));
        self
    }

    /// Derive the jobs from the current state of the working directory.
    pub fn jobs(&self, ctx: &Context) -> Result<Vec<Job>> {
        Ok(match &self.inputs {
            Inputs::Nothing => vec![Job::default()],
            Inputs::Files { inputs, outputs } => vec![Job {
                inputs: inputs.clone(),
                outputs: outputs.clone(),
            }],
            Inputs::Transform { pattern, outputs } => pattern
                .matches(&ctx.workdir)?
                .into_iter()
                .map(|input| Job {
                    outputs: outputs.iter().map(|t| pattern.expand(&input, t)).collect(),
                    inputs: vec![input],
                })
                .collect(),
            Inputs::Merge { pattern, output } => {
                let inputs = pattern.matches(&ctx.workdir)?;
                if inputs.is_empty() {
                    warn!(ctx.logger, "No files match {}", pattern.as_str());
                    Vec::new()
                } else {
                    vec![Job {
                        inputs,
                        outputs: vec![output.clone()],
                    }]
                }
            }
        })
    }

    /// Run the body for `job`; tasks without body do nothing.
    pub fn execute(&self, ctx: &Context, job: &Job) -> Result<()> {
        match &self.body {
            Some(body) => body(ctx, job),
            None => Ok(()),
        }
    }
}
