use clap::builder::styling::{AnsiColor, Styles};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::compiler::TargetModel;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::Cyan.on_default().bold())
    .placeholder(AnsiColor::Cyan.on_default())
    .error(AnsiColor::Red.on_default().bold());

#[derive(Parser)]
#[command(name = "kernelc")]
#[command(about = "Drive an incremental kernel compiler (frontend server)")]
#[command(version)]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// One-shot batch compile with input-fingerprint caching
    Compile(CompileArgs),

    /// Long-lived resident compiler driven from the terminal
    Resident(ResidentArgs),
}

#[derive(Args)]
pub struct CompileArgs {
    /// Entry point to compile
    pub main: PathBuf,

    /// SDK root handed to the frontend server
    #[arg(long, value_name = "DIR")]
    pub sdk_root: String,

    /// Directory holding the VM binary and the frontend server snapshot
    #[arg(long, value_name = "DIR")]
    pub engine: PathBuf,

    /// Where the compiled kernel goes
    #[arg(long, value_name = "FILE")]
    pub output_dill: String,

    /// Make-style dependency file; enables fingerprint caching
    #[arg(long, value_name = "FILE")]
    pub depfile: Option<String>,

    #[arg(long, default_value = "flutter", value_parser = TargetModel::from_str)]
    pub target: TargetModel,

    /// Whole-program AOT compile
    #[arg(long)]
    pub aot: bool,

    #[arg(long)]
    pub track_widget_creation: bool,

    /// Leave the platform kernel out of the output
    #[arg(long)]
    pub no_link_platform: bool,

    /// Define dart.vm.product for the compile
    #[arg(long)]
    pub product: bool,

    #[arg(long, value_name = "DIR")]
    pub incremental_byte_store: Option<String>,

    /// Package map used to resolve the entry point
    #[arg(long, value_name = "FILE")]
    pub packages: Option<String>,

    #[arg(long = "filesystem-root", value_name = "DIR")]
    pub filesystem_roots: Vec<String>,

    #[arg(long, value_name = "SCHEME")]
    pub filesystem_scheme: Option<String>,

    /// Extra options forwarded to the frontend server verbatim
    #[arg(last = true)]
    pub extra: Vec<String>,
}

#[derive(Args)]
pub struct ResidentArgs {
    /// Entry point for the cold compile
    pub main: PathBuf,

    #[arg(long, value_name = "DIR")]
    pub sdk_root: String,

    /// Directory holding the VM binary and the frontend server snapshot
    #[arg(long, value_name = "DIR")]
    pub engine: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub output_dill: Option<String>,

    #[arg(long, default_value = "flutter", value_parser = TargetModel::from_str)]
    pub target: TargetModel,

    #[arg(long)]
    pub track_widget_creation: bool,

    #[arg(long, value_name = "FILE")]
    pub packages: Option<String>,

    #[arg(long = "filesystem-root", value_name = "DIR")]
    pub filesystem_roots: Vec<String>,

    #[arg(long, value_name = "SCHEME")]
    pub filesystem_scheme: Option<String>,

    /// Warm the compiler from a previous kernel file
    #[arg(long, value_name = "FILE")]
    pub initialize_from_dill: Option<String>,

    #[arg(long)]
    pub unsafe_package_serialization: bool,

    /// Language experiments, one flag per occurrence
    #[arg(long = "enable-experiment", value_name = "FLAG")]
    pub experiments: Vec<String>,
}
