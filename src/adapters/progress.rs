use crate::domain::ports::{ProgressObserver, ProgressUpdate, Reporter};

/// Logs progress updates at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        let percent = if update.total > 0 {
            update.done as f64 * 100.0 / update.total as f64
        } else {
            100.0
        };
        match update.remaining {
            Some(remaining) if update.done < update.total => tracing::info!(
                "⏳ {}: {}/{} ({:.0}%), {:.1?} elapsed, ~{:.1?} left",
                update.label,
                update.done,
                update.total,
                percent,
                update.elapsed,
                remaining
            ),
            _ => tracing::info!(
                "⏳ {}: {}/{} ({:.0}%), {:.1?} elapsed",
                update.label,
                update.done,
                update.total,
                percent,
                update.elapsed
            ),
        }
    }
}

/// Status messages go to the log instead of a dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn show_text(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Hooks;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_adapters_accept_updates() {
        LogProgress.on_progress(&ProgressUpdate {
            label: "Filling voxels".to_string(),
            done: 3,
            total: 10,
            elapsed: Duration::from_millis(30),
            remaining: Some(Duration::from_millis(70)),
        });
        TracingReporter.show_text("Merging models");
    }

    #[test]
    fn test_closure_reporter_receives_messages() {
        let seen = Mutex::new(Vec::new());
        let sink = |message: &str| seen.lock().unwrap().push(message.to_string());
        let hooks = Hooks::default().with_reporter(&sink);
        hooks.report("Blending DTM Dataset");
        assert_eq!(*seen.lock().unwrap(), vec!["Blending DTM Dataset".to_string()]);
    }
}
