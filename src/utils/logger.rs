use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One compact line per event, for terminals.
    #[default]
    Compact,
    /// JSON lines for unattended job runs, where the log is collected by another tool.
    Json,
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "lithmod=debug,info"
    } else {
        "lithmod=info"
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logger(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_enables_crate_debug() {
        assert_eq!(default_directive(false), "lithmod=info");
        assert!(default_directive(true).starts_with("lithmod=debug"));
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}
