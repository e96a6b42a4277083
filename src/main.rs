use std::process::ExitCode;

fn main() -> ExitCode {
    // Delegate to the CLI runner in the library crate.
    ytaudio::cli::run()
}
