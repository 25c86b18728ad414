//! Entry point for the RuNeSplit application.
//! Handles CLI parsing, logging setup, and dispatches the split, checksum and variables commands.

use clap::Parser;
use ru_ne_split::checksum::{check_checksum_list, update_checksum_list};
use ru_ne_split::cli::{Args, ChecksumArgs, Command, SplitArgs, VariablesArgs};
use ru_ne_split::config::RunConfig;
use ru_ne_split::driver::run_split;
use ru_ne_split::errors::Result;
use ru_ne_split::variables::variables_for_experiment;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

fn split(args: SplitArgs) -> Result<bool> {
    let base = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let config = base.merge(args.overrides())?;

    let report = run_split(&config, &args.inputs, args.force)?;
    info!(
        files = report.files.len(),
        extracted = report.extracted(),
        already_present = report.already_present(),
        deleted_sources = report.deleted_sources(),
        "split run finished"
    );
    for failed in report.failed_files() {
        for failure in &failed.failures {
            warn!(file = %failed.source.display(), "{}", failure);
        }
    }
    if !report.succeeded() {
        error!(
            "{} file(s) had failures, see {}",
            report.failed_files().count(),
            config.error_log_path().display()
        );
    }
    Ok(report.succeeded())
}

fn checksum(args: ChecksumArgs) -> Result<bool> {
    if args.check {
        let report = check_checksum_list(&args.root, &args.list)?;
        info!(
            ok = report.ok,
            mismatched = report.mismatched.len(),
            missing = report.missing.len(),
            "checksum check finished"
        );
        Ok(report.passed())
    } else {
        let summary = update_checksum_list(&args.root, &args.list)?;
        Ok(summary.failed.is_empty())
    }
}

fn variables(args: VariablesArgs) -> Result<bool> {
    let vars = variables_for_experiment(&args.assets, &args.experiment, args.frequency)?;
    for var in &vars {
        if args.normalized {
            println!("{},{}", var.name, var.normalized);
        } else {
            println!("{}", var.name);
        }
    }
    Ok(true)
}

fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let outcome = match args.command {
        Command::Split(split_args) => split(split_args),
        Command::Checksum(checksum_args) => checksum(checksum_args),
        Command::Variables(variables_args) => variables(variables_args),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
