use std::process::ExitCode;

fn main() -> ExitCode {
    ednna_cli::run()
}
