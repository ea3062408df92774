use clap::{Args, Parser, Subcommand, ValueEnum};
use procgraph::engine::node::NodeContext;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "procgraph - build and modify atomistic configurations from procedure files.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a generation procedure and print a summary of the resulting configuration.
    Run(RunArgs),
    /// Load a procedure and report every scoping problem it has.
    Check(CheckArgs),
    /// Rewrite a legacy or older procedure file as a current TOML document.
    Convert(ConvertArgs),
    /// List the available node types by category.
    Nodes(NodesArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Procedure file, either a TOML document or the legacy block format.
    #[arg(required = true, value_name = "PROCEDURE")]
    pub procedure: PathBuf,

    /// Run configuration file in TOML format (run settings and species).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the random seed from the config file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of processes from the config file.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub processes: Option<usize>,

    /// Override the name of the generated configuration.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S run.seed=42
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Procedure file to check.
    #[arg(required = true, value_name = "PROCEDURE")]
    pub procedure: PathBuf,

    /// Run configuration whose species are used to check species names.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Context the procedure root provides.
    #[arg(long, value_enum, default_value_t = ContextArg::Generation)]
    pub context: ContextArg,
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Procedure file to convert.
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,

    /// Destination of the converted document.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Context the procedure root provides.
    #[arg(long, value_enum, default_value_t = ContextArg::Generation)]
    pub context: ContextArg,
}

/// Arguments for the `nodes` subcommand.
#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Show only the given category.
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextArg {
    Generation,
    Analysis,
}

impl From<ContextArg> for NodeContext {
    fn from(arg: ContextArg) -> Self {
        match arg {
            ContextArg::Generation => NodeContext::Generation,
            ContextArg::Analysis => NodeContext::Analysis,
        }
    }
}
