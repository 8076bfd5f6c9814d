//! Lambeck Studio server binary.
//! Run with: cargo run --bin lambeck-server

use std::process::ExitCode;

use lambeck_studio::start_lambeck_studio;

fn main() -> ExitCode {
    start_lambeck_studio::run()
}
