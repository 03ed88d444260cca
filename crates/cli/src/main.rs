use std::process::ExitCode;

fn main() -> ExitCode {
    tipping_cli::run()
}
