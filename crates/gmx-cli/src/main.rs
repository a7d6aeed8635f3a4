//! `gmx` command-line entry point.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use gmx_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use gmx_cli::commands::{run_describe, run_merge, run_repartition};
use gmx_cli::logging::{LogConfig, LogFormat, init_logging};
use gmx_cli::summary::{print_description, print_merge_summary, print_repartition_summary};
use gmx_core::{ExecutionConfig, ExecutionContext};
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let ctx = match ExecutionContext::new(execution_config(&cli)) {
        Ok(ctx) => ctx,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    };
    let outcome = match &cli.command {
        Command::Merge(args) => run_merge(args, &ctx).map(|result| print_merge_summary(&result)),
        Command::Repartition(args) => {
            run_repartition(args, &ctx).map(|result| print_repartition_summary(&result))
        }
        Command::Describe(args) => run_describe(args, &ctx).map(|result| print_description(&result)),
    };
    let mut exit_code = match outcome {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    if let Err(error) = ctx.shutdown() {
        eprintln!("warning: {error}");
        exit_code = exit_code.max(1);
    }
    std::process::exit(exit_code);
}

fn execution_config(cli: &Cli) -> ExecutionConfig {
    let mut config = ExecutionConfig::default();
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    if let Some(dir) = &cli.tmp_dir {
        config = config.with_tmp_dir(dir);
    }
    config
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
