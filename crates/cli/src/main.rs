use std::process::ExitCode;

fn main() -> ExitCode {
    bakecast_cli::run()
}
