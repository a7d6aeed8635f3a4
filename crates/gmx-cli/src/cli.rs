//! CLI argument definitions for `gmx`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "gmx",
    version,
    about = "Harmonize and merge partitioned genomic matrix datasets",
    long_about = "Combine variant-by-sample datasets into one.\n\n\
                  Samples already present in a higher-priority input are dropped,\n\
                  row and entry fields are aligned, and the inputs are outer-joined\n\
                  on the row key into a partitioned output dataset."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Worker threads for partition work (default: available cores).
    #[arg(long, env = "GMX_THREADS", global = true)]
    pub threads: Option<usize>,

    /// Parent directory for the session scratch space.
    #[arg(long = "tmp-dir", value_name = "DIR", env = "GMX_TMP_DIR", global = true)]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deduplicate, align and merge datasets into one.
    Merge(MergeArgs),

    /// Rewrite a dataset with a different number of partitions.
    Repartition(RepartitionArgs),

    /// Show the schema and partition table of a stored dataset.
    Describe(DescribeArgs),
}

#[derive(Parser)]
pub struct MergeArgs {
    /// Input datasets, highest priority first.
    #[arg(value_name = "INPUT", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Directory for the merged dataset.
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// How row and entry fields are aligned across inputs.
    #[arg(long, value_enum, default_value = "intersection")]
    pub mode: ModeArg,

    /// Target number of output partitions.
    #[arg(long, value_name = "N")]
    pub partitions: Option<usize>,

    /// Fail instead of replacing an existing output.
    #[arg(long = "no-overwrite")]
    pub no_overwrite: bool,

    /// Write the dropped samples to this CSV file.
    #[arg(long = "drop-report", value_name = "CSV")]
    pub drop_report: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RepartitionArgs {
    /// Dataset to repartition.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of output partitions.
    #[arg(short = 'n', long, value_name = "N")]
    pub partitions: usize,

    /// Directory for the repartitioned dataset.
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Coalesce adjacent partitions instead of rebalancing rows.
    #[arg(long = "no-shuffle")]
    pub no_shuffle: bool,

    /// Fail instead of replacing an existing output.
    #[arg(long = "no-overwrite")]
    pub no_overwrite: bool,
}

#[derive(Parser)]
pub struct DescribeArgs {
    /// Stored dataset directory.
    #[arg(value_name = "DATASET")]
    pub path: PathBuf,

    /// Read every partition and verify checksums and key order.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Keep only fields present in every input.
    Intersection,
    /// Keep every field, filling missing ones.
    Union,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_takes_inputs_in_priority_order() {
        let cli = Cli::try_parse_from([
            "gmx", "merge", "a.gmx", "b.gmx", "c.gmx", "-o", "out.gmx", "--mode", "union",
            "--partitions", "8",
        ])
        .unwrap();
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(
            args.inputs,
            [
                PathBuf::from("a.gmx"),
                PathBuf::from("b.gmx"),
                PathBuf::from("c.gmx")
            ]
        );
        assert!(matches!(args.mode, ModeArg::Union));
        assert_eq!(args.partitions, Some(8));
        assert!(!args.no_overwrite);
    }

    #[test]
    fn repartition_requires_a_count() {
        assert!(Cli::try_parse_from(["gmx", "repartition", "a.gmx", "-o", "b.gmx"]).is_err());
        let cli =
            Cli::try_parse_from(["gmx", "repartition", "a.gmx", "-n", "4", "-o", "b.gmx"]).unwrap();
        let Command::Repartition(args) = cli.command else {
            panic!("expected repartition");
        };
        assert_eq!(args.partitions, 4);
        assert!(!args.no_shuffle);
    }
}
