//! Logging initialization for the CLI.

use crate::Paths;

/// Initialize logging for the `credbroker` binary.
///
/// Events always go to the JSONL file under the logs dir. `debug` mirrors
/// them on stderr, which is what `--debug` toggles.
pub fn init_logging(level: &str, debug: bool, paths: Option<&Paths>) {
    let level = if debug { "debug" } else { level };

    observability::init_with_config(observability::LogConfig {
        service_name: crate::APP_NAME.into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr: debug,
    });
}
