/// Execution of a scheduled pipeline.
use std::fs;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::context::Context;
use crate::errors::*;
use crate::graph::Pipeline;
use crate::task::Job;

/// Status of one scheduled task, as listed by `show()`.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskStatus {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub follows: Vec<String>,
    /// Number of jobs given the current state of the working directory.
    pub jobs: usize,
    /// Number of those jobs that are out of date.
    pub pending: usize,
}

/// Counts collected while running a pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub jobs_run: usize,
    pub jobs_up_to_date: usize,
    /// Names of the tasks skipped because they are inactive.
    pub inactive: Vec<String>,
}

/// List the tasks scheduled for `target` with their job counts.
pub fn show(pipeline: &Pipeline, target: &str, ctx: &Context) -> Result<Vec<TaskStatus>> {
    let mut result = Vec::new();
    for task in pipeline.schedule(target)? {
        let (jobs, pending) = if task.active {
            let jobs = task.jobs(ctx)?;
            let pending = jobs.iter().filter(|job| !ctx.is_up_to_date(job)).count();
            (jobs.len(), pending)
        } else {
            (0, 0)
        };
        result.push(TaskStatus {
            name: task.name.clone(),
            description: task.description.clone(),
            active: task.active,
            follows: task.follows.clone(),
            jobs,
            pending,
        });
    }
    Ok(result)
}

/// Run `target` and everything it depends on.
///
/// Tasks run one after another in schedule order, the out-of-date jobs of a task in parallel
/// on `threads` threads.  The first failure aborts the run.
pub fn run(pipeline: &Pipeline, target: &str, ctx: &Context, threads: usize) -> Result<Summary> {
    let schedule = pipeline.schedule(target)?;
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .chain_err(|| "Could not create thread pool")?;

    info!(
        ctx.logger,
        "Running {} tasks for target {}",
        schedule.len(),
        target
    );
    let mut summary = Summary::default();
    for task in schedule {
        let task_ctx = ctx.for_task(&task.name);
        if !task.active {
            info!(task_ctx.logger, "Inactive, skipping");
            summary.inactive.push(task.name.clone());
            continue;
        }

        for dir in &task.mkdirs {
            fs::create_dir_all(ctx.path(dir))
                .chain_err(|| format!("Could not create directory {}", dir.display()))?;
        }

        let jobs = task.jobs(&task_ctx)?;
        let (pending, done): (Vec<Job>, Vec<Job>) = jobs
            .into_iter()
            .partition(|job| !task_ctx.is_up_to_date(job));
        summary.jobs_up_to_date += done.len();
        if pending.is_empty() {
            info!(task_ctx.logger, "Up to date");
            continue;
        }

        info!(
            task_ctx.logger,
            "Running {} jobs ({} up to date)",
            pending.len(),
            done.len()
        );
        // No new jobs are started once one has failed.
        pool.install(|| {
            pending
                .par_iter()
                .try_for_each(|job| task.execute(&task_ctx, job))
        })
        .chain_err(|| format!("Task {} failed", task.name))?;
        summary.jobs_run += pending.len();
        info!(task_ctx.logger, " => done");
    }

    info!(
        ctx.logger,
        "Ran {} jobs, {} were up to date",
        summary.jobs_run,
        summary.jobs_up_to_date
    );
    Ok(summary)
}
