use std::process::ExitCode;
use support::{run, AppConfig};

fn main() -> ExitCode {
    run(AppConfig::default())
}
