// `error_chain!` can recurse deeply.
#![recursion_limit = "1024"]

// We are using `error-chain`.
#[macro_use]
extern crate error_chain;

// We are using the `clap` crate for command line argument parsing.
#[macro_use]
extern crate clap;

// We are using the `slog` crate for logging.
#[macro_use]
extern crate slog;

use std::env;
use std::result;
use std::sync::atomic::Ordering;
use std::sync::{atomic, Arc};

use clap::{App, ArgMatches};

use slog::{Drain, Logger};

use lib_pipeline::{runner, Context, Pipeline};
use lib_shared::config::{self, Params};
use lib_shared::run_mode::RunMode;

mod coverage;
mod mapping;
mod options;
mod pipeline;
mod readcounts;
mod readquant;
mod report;
mod statements;
mod summarystats;

use crate::options::{GlobalOptions, MakeOptions, TargetOptions};
use crate::pipeline::Setup;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use crate::errors::*;

/// Custom `slog` Drain logic
struct RuntimeLevelFilter<D> {
    drain: D,
    log_level: Arc<atomic::AtomicIsize>,
}

impl<D> Drain for RuntimeLevelFilter<D>
where
    D: Drain,
{
    type Ok = Option<D::Ok>;
    type Err = Option<D::Err>;

    fn log(
        &self,
        record: &slog::Record,
        values: &slog::OwnedKVList,
    ) -> result::Result<Self::Ok, Self::Err> {
        let current_level = match self.log_level.load(Ordering::Relaxed) {
            0 => slog::Level::Warning,
            1 => slog::Level::Info,
            2 => slog::Level::Debug,
            _ => slog::Level::Trace,
        };

        if record.level().is_at_least(current_level) {
            self.drain.log(record, values).map(Some).map_err(Some)
        } else {
            Ok(None)
        }
    }
}

/// Load the configuration and declare the task graph for the working directory.
fn load_pipeline(logger: &Logger, options: &GlobalOptions) -> Result<Pipeline> {
    let params = Params::load(
        &config::search_paths(&options.workdir),
        options.config.as_ref().map(|p| p.as_path()),
    )
    .chain_err(|| "Could not load configuration")?;
    debug!(logger, "Configuration: {:?}", params);

    let mode = RunMode::detect(options.workdir.join(&params.input_dir), params.strandedness)
        .chain_err(|| "Could not detect run mode")?;
    info!(logger, "Run mode: {}", mode);

    let setup = Setup::new(params, mode).chain_err(|| "Invalid configuration")?;
    pipeline::build(Arc::new(setup)).chain_err(|| "Invalid task graph")
}

/// Implementation of "mrnaseq show".
fn show(
    logger: &Logger,
    ctx: &Context,
    options: &TargetOptions,
    pipeline: &Pipeline,
) -> Result<()> {
    let status = runner::show(pipeline, &options.target, ctx)
        .chain_err(|| format!("Could not list tasks for {}", options.target))?;
    for task in &status {
        println!(
            "{:<32}{:<10}{:>6} jobs{:>6} out of date  {}",
            task.name,
            if task.active { "active" } else { "inactive" },
            task.jobs,
            task.pending,
            task.description
        );
    }
    info!(logger, "{} tasks needed for {}", status.len(), options.target);
    Ok(())
}

/// Implementation of "mrnaseq make".
fn make(
    logger: &Logger,
    ctx: &Context,
    options: &MakeOptions,
    pipeline: &Pipeline,
) -> Result<()> {
    info!(logger, "Options: {:?}", options);
    let mut ctx = ctx.clone();
    ctx.force = options.force;
    let summary = runner::run(pipeline, &options.target, &ctx, options.jobs)
        .chain_err(|| format!("Could not make {}", options.target))?;
    if !summary.inactive.is_empty() {
        info!(logger, "Skipped inactive tasks: {}", summary.inactive.join(", "));
    }
    info!(logger, "All done. Have a nice day!");
    Ok(())
}

fn run(matches: ArgMatches) -> Result<()> {
    // Logging setup ------------------------------------------------------------------------------

    // Atomic variable controlling logging level
    let log_level = Arc::new(atomic::AtomicIsize::new(1));

    // Perform slog setup
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build();
    let drain = RuntimeLevelFilter {
        drain: drain,
        log_level: log_level.clone(),
    }
    .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    let logger = slog::Logger::root(drain, o!());

    // Switch log level
    if matches.is_present("quiet") {
        log_level.store(0, Ordering::Relaxed);
    } else {
        log_level.store(
            1 + matches.occurrences_of("verbose") as isize,
            Ordering::Relaxed,
        );
    };

    let args: Vec<String> = env::args().collect();
    debug!(
        logger,
        "Command line: {}",
        shlex::try_join(args.iter().map(|s| s.as_str())).unwrap_or_else(|_| args.join(" "))
    );

    let global = GlobalOptions::new(&matches);

    // Dispatch commands from command line.
    match matches.subcommand() {
        ("config", Some(_)) => {
            let path = global.workdir.join(config::CONFIG_FILE);
            config::write_default(&path).chain_err(|| "Could not write default configuration")?;
            info!(logger, "Wrote default configuration to {}", path.display());
        }
        (name, Some(m)) => {
            let pipeline = load_pipeline(&logger, &global)?;
            let ctx = Context::new(logger.new(o!()), global.workdir.clone());
            match name {
                "show" => show(&logger, &ctx, &TargetOptions::new(m), &pipeline)?,
                "make" => make(&logger, &ctx, &MakeOptions::new(m), &pipeline)?,
                "plot" => {
                    let target = TargetOptions::new(m).target;
                    print!(
                        "{}",
                        pipeline
                            .to_dot(&target)
                            .chain_err(|| format!("Could not plot {}", target))?
                    );
                }
                _ => bail!("Invalid command: {}", name),
            }
        }
        _ => bail!("Invalid command: {}", matches.subcommand().0),
    }

    Ok(())
}

fn main() {
    let yaml = load_yaml!("cli.yaml");
    let matches = App::from_yaml(yaml).get_matches();

    if let Err(ref e) = run(matches) {
        eprintln!("error: {}", e);

        for e in e.iter().skip(1) {
            eprintln!("caused by: {}", e);
        }

        // Only generated with `RUST_BACKTRACE=1`.
        if let Some(backtrace) = e.backtrace() {
            eprintln!("backtrace: {:?}", backtrace);
        }

        ::std::process::exit(1);
    }
}
