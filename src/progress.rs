use std::sync::Arc;

use chrono::NaiveDate;

/// Events emitted during a run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Followed shows and saved episodes have been listed
    LibraryLoaded {
        show_count: usize,
        saved_episode_count: usize,
    },

    /// A show is about to be scanned
    ScanningShow {
        show_name: String,
        /// Index of this show in the followed-show list
        show_index: usize,
        total_shows: usize,
    },

    /// A show was scanned successfully
    ShowScanned {
        show_name: String,
        new_episodes: usize,
        /// Stored watermark, or the lookback start for a show without one
        since: NaiveDate,
    },

    /// Listing a show's episodes failed
    ShowFailed { show_name: String, error: String },

    /// An episode was added to the saved episodes
    EpisodeSaved {
        show_name: String,
        episode_title: String,
        release_date: Option<NaiveDate>,
    },

    /// Saving an episode failed
    EpisodeSaveFailed {
        show_name: String,
        episode_title: String,
        error: String,
    },

    /// A summary notification was delivered
    NotificationSent { template: String },

    /// Delivering the summary notification failed
    NotificationFailed { template: String, error: String },

    /// Run finished
    RunCompleted {
        added_count: usize,
        failed_shows: usize,
        failed_saves: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display spinners, print summaries,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for CountingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::LibraryLoaded {
            show_count: 3,
            saved_episode_count: 10,
        });
        reporter.report(ProgressEvent::ShowFailed {
            show_name: "Gone".to_string(),
            error: "HTTP 404".to_string(),
        });
        reporter.report(ProgressEvent::RunCompleted {
            added_count: 0,
            failed_shows: 1,
            failed_saves: 0,
        });
    }

    #[test]
    fn shared_reporters_receive_events() {
        let counting = Arc::new(CountingReporter::default());
        let shared: SharedProgressReporter = counting.clone();

        shared.report(ProgressEvent::EpisodeSaved {
            show_name: "TechTalk".to_string(),
            episode_title: "Rust 2024".to_string(),
            release_date: NaiveDate::from_ymd_opt(2024, 1, 9),
        });
        shared.report(ProgressEvent::NotificationSent {
            template: "autosave_added".to_string(),
        });

        assert_eq!(counting.events.lock().unwrap().len(), 2);
    }
}
