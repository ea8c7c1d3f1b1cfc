use std::process::ExitCode;

fn main() -> ExitCode {
    match spectemp::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("spectemp: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
