use std::process::ExitCode;

fn main() -> ExitCode {
    tertulia_cli::run()
}
