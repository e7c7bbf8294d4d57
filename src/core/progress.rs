use crate::domain::ports::{ProgressObserver, ProgressUpdate};
use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Pass-through iterator that reports how far it has got.
///
/// Updates go out at most once per [`REPORT_INTERVAL`], plus once when the
/// inner iterator is exhausted. Without an observer it only counts.
pub struct Tracked<'a, I> {
    inner: I,
    label: String,
    observer: Option<&'a dyn ProgressObserver>,
    total: usize,
    done: usize,
    started: Instant,
    last_report: Instant,
    finished: bool,
}

pub fn track<'a, I>(
    iter: I,
    label: &str,
    observer: Option<&'a dyn ProgressObserver>,
) -> Tracked<'a, I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
{
    let inner = iter.into_iter();
    let now = Instant::now();
    Tracked {
        total: inner.len(),
        inner,
        label: label.to_string(),
        observer,
        done: 0,
        started: now,
        last_report: now,
        finished: false,
    }
}

impl<I> Tracked<'_, I> {
    fn update(&self) -> ProgressUpdate {
        let elapsed = self.started.elapsed();
        let remaining = if self.done > 0 {
            let per_item = elapsed.as_secs_f64() / self.done as f64;
            Some(Duration::from_secs_f64(
                per_item * self.total.saturating_sub(self.done) as f64,
            ))
        } else {
            None
        };
        ProgressUpdate {
            label: self.label.clone(),
            done: self.done,
            total: self.total,
            elapsed,
            remaining,
        }
    }
}

impl<I: Iterator> Iterator for Tracked<'_, I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.done += 1;
                if let Some(observer) = self.observer {
                    if self.last_report.elapsed() >= REPORT_INTERVAL {
                        self.last_report = Instant::now();
                        observer.on_progress(&self.update());
                    }
                }
                Some(item)
            }
            None => {
                if !self.finished {
                    self.finished = true;
                    if let Some(observer) = self.observer {
                        observer.on_progress(&self.update());
                    }
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.clone());
        }
    }

    #[test]
    fn test_track_is_transparent() {
        let items: Vec<i32> = track(vec![1, 2, 3], "samples", None).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_track_reports_completion_once() {
        let recorder = Recorder::default();
        let mut tracked = track(0..5, "samples", Some(&recorder));
        let sum: i32 = tracked.by_ref().sum();
        assert_eq!(sum, 10);
        assert!(tracked.next().is_none());

        let updates = recorder.updates.lock().unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.done, 5);
        assert_eq!(last.total, 5);
        assert_eq!(last.label, "samples");
        assert_eq!(updates.iter().filter(|u| u.done == u.total).count(), 1);
    }
}
