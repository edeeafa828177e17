//! frontpipe - Command-line tool for building and serving a static front-end

use std::process::ExitCode;

use frontpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
