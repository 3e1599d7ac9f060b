use std::process::ExitCode;

fn main() -> ExitCode {
    offerank_cli::run()
}
