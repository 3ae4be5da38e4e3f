/// Module with shared code.
#[macro_use]
extern crate error_chain;

#[macro_use]
extern crate slog;

#[macro_use]
extern crate strum_macros;

pub mod bam_utils;
pub mod config;
pub mod database;
pub mod files;
pub mod run_mode;
