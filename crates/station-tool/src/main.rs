mod commands;
mod logging;
mod settings;

use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    logging::setup_logging(settings.verbose);

    let mut stdout = std::io::stdout().lock();
    match commands::execute(&settings, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::report_error(&e, &mut std::io::stderr().lock());
            ExitCode::FAILURE
        }
    }
}
