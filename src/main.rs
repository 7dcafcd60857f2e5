//! Binary entrypoint for the `schemalink` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // Logging is installed by `run` once the config (and its level) is known.
    match schemalink::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
