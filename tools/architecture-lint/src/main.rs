//! Runs the architecture lint over the `story-sync` package.
//!
//! Takes an optional path to the package directory; defaults to the
//! `story-sync` sibling of this tool in the workspace.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};

fn main() -> ExitCode {
    let crate_dir = match env::args_os().nth(1) {
        Some(arg) => match Utf8PathBuf::from_path_buf(arg.into()) {
            Ok(path) => path,
            Err(path) => {
                return report(
                    io::stderr().lock(),
                    &format!("package path {} is not UTF-8", path.display()),
                    ExitCode::FAILURE,
                );
            }
        },
        None => Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../../story-sync"),
    };

    match architecture_lint::lint_crate_sources(&crate_dir) {
        Ok(checked) => report(
            io::stdout().lock(),
            &format!("architecture lint: {checked} files clean"),
            ExitCode::SUCCESS,
        ),
        Err(err) => report(io::stderr().lock(), &err.to_string(), ExitCode::FAILURE),
    }
}

fn report(mut out: impl Write, message: &str, code: ExitCode) -> ExitCode {
    match writeln!(out, "{}", message.trim_end()) {
        Ok(()) => code,
        Err(_) => ExitCode::from(2),
    }
}
