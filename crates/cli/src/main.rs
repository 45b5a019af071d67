use std::process::ExitCode;

fn main() -> ExitCode {
    deskline_cli::run()
}
