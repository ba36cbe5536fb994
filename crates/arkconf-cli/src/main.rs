use std::process::ExitCode;

fn main() -> ExitCode {
    arkconf_cli::run()
}
