// src/logging.rs
// =============================================================================
// Diagnostics go through the `log` facade and are printed by env_logger on
// stderr. The report itself (the table or JSON) is printed on stdout, so
// logs never mix into `--json` output.
//
// RUST_LOG, when set, wins over --verbose/--quiet.
// =============================================================================

use log::{debug, LevelFilter};

/// Initialize the logger once, at startup
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = level_for(verbose, quiet);

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    debug!("Logger initialized with level: {level:?}");
}

fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Off
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}
