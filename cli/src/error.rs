use std::process::ExitCode;

pub type CliResult<T> = anyhow::Result<T>;

/// Exit status when the worker did not answer in time
const EXIT_INTERRUPTED: u8 = 2;

/// Convert a CliResult to an ExitCode, printing errors to stderr
///
/// Jobs that timed out or were cancelled exit with status 2 so scripts can
/// tell them apart from other failures.
pub fn to_exit_code(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            let interrupted = e
                .downcast_ref::<tether::Error>()
                .is_some_and(tether::Error::is_interrupted);
            if interrupted {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
