use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    prelude::*,
};

fn verbosity_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// The library and the binary (both under the `procgraph` target) log at `level`;
/// everything else is capped at warnings.
fn target_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_target("procgraph", level)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = verbosity_level(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(target_filter(level));

    let subscriber = tracing_subscriber::registry().with(stderr_layer);

    match log_file {
        Some(path) => {
            let file = File::create(&path).map_err(CliError::Io)?;
            // At least INFO in the file, with span timings.
            let file_level = level.max(LevelFilter::INFO);
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(target_filter(file_level));
            subscriber.with(file_layer).init();
        }
        None => subscriber.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{Level, debug, error, info, info_span, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_level(0, false), LevelFilter::WARN);
        assert_eq!(verbosity_level(1, false), LevelFilter::INFO);
        assert_eq!(verbosity_level(2, false), LevelFilter::DEBUG);
        assert_eq!(verbosity_level(7, false), LevelFilter::TRACE);
        assert_eq!(verbosity_level(3, true), LevelFilter::OFF);
    }

    #[test]
    fn dependencies_stay_at_warnings() {
        let filter = target_filter(LevelFilter::DEBUG);
        assert!(filter.would_enable("procgraph::engine::procedure", &Level::DEBUG));
        assert!(filter.would_enable("procgraph::commands::run", &Level::DEBUG));
        assert!(!filter.would_enable("indicatif", &Level::INFO));
        assert!(filter.would_enable("indicatif", &Level::WARN));

        let quiet = target_filter(LevelFilter::OFF);
        assert!(!quiet.would_enable("procgraph", &Level::ERROR));
        assert!(!quiet.would_enable("indicatif", &Level::ERROR));
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!("This is an error");
        warn!("This is a warning");
        info!("This is info");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    #[serial]
    fn file_layer_records_node_lines_and_span_timings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("run.log");

        let file = File::create(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE);
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("procedure_execute", configuration = "Bulk");
            let _guard = span.enter();
            info!("[Add] Adding species 'Water' - population is 100.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("[Add] Adding species 'Water' - population is 100."));
        assert!(content.contains("procedure_execute"));
        assert!(content.contains("close"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
