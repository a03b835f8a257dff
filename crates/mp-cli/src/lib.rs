use std::ffi::OsString;

use clap::Parser;

mod cli_args;
mod commands;
mod error_map;
mod source_loader;
mod telemetry;

pub(crate) use cli_args::{CheckArgs, Cli, GradeArgs, Mode, RealizeArgs};
pub(crate) use error_map::emit_error;
pub(crate) use source_loader::{collect_problem_files, load_problem, read_problem_file};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    telemetry::init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Mode::Check(args) => commands::run_check(args),
        Mode::Realize(args) => commands::run_realize(args),
        Mode::Grade(args) => commands::run_grade(args),
    }
}

#[cfg(test)]
mod tests;
