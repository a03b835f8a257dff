use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mp")]
#[command(about = "Load, realize and grade randomized math problems")]
pub(crate) struct Cli {
    /// Log realization details (equivalent to RUST_LOG=debug).
    #[arg(long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Load problem documents and report diagnostics.
    Check(CheckArgs),
    /// Realize one problem and print the instance.
    Realize(RealizeArgs),
    /// Realize one problem, submit form answers and print the grading report.
    Grade(GradeArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(required = true)]
    pub(crate) paths: Vec<PathBuf>,
    /// Also report deprecated constructs.
    #[arg(long)]
    pub(crate) strict: bool,
}

#[derive(Debug, Args)]
pub(crate) struct RealizeArgs {
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) seed: Option<u32>,
    /// Print the instance as JSON instead of HTML.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Args)]
pub(crate) struct GradeArgs {
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) seed: Option<u32>,
    /// Form parameter as KEY=VALUE; repeat a key to submit several values.
    #[arg(long = "answer", value_name = "KEY=VALUE")]
    pub(crate) answers: Vec<String>,
}
