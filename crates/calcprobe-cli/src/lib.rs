//! calcprobe CLI library
//!
//! Argument parsing, terminal reporting and the scenario runner behind the
//! `calcprobe` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    CaptchaArg, Cli, ColorArg, Commands, ConfigArgs, DriverArg, FormatArg, ListArgs, RunArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, ProgressReporter};
pub use runner::{TestResult, TestResults, TestRunner, Verdict};
