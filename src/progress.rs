// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Events emitted while archiving subscriptions and rendering feeds
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The shared feed stylesheet was written
    StylesheetWritten { path: PathBuf },

    /// A subscription was left out of this run
    SubscriptionSkipped { name: String, reason: String },

    /// Processing of a subscription begins
    SubscriptionStarted { name: String },

    /// The source is being listed by the extraction engine
    EnumeratingSource { name: String, url: String },

    /// The source could not be listed; nothing new this run
    EnumerationFailed { name: String, error: String },

    /// The source was listed successfully
    SourceEnumerated {
        name: String,
        total_entries: usize,
        /// Entries left after the newest-N cap
        to_consider: usize,
    },

    /// The source is downloaded as a whole, without per-item tracking
    DownloadingPlaylist { name: String, url: String },

    /// The engine returned no metadata for an entry (out of date range or unreachable)
    EntryFilteredOut { url: String },

    /// An entry has a marker file already
    EntryAlreadyArchived { label: String },

    /// An entry is a live stream in progress and is retried next run
    EntryLiveSkipped { label: String },

    /// A download is starting
    DownloadStarting {
        label: String,
        /// Index of this entry among the entries considered
        entry_index: usize,
        total_entries: usize,
    },

    /// A download completed and its marker was written
    DownloadCompleted { label: String },

    /// A download failed; the entry stays unarchived
    DownloadFailed { label: String, error: String },

    /// The channel icon was stored
    IconFetched { path: PathBuf },

    /// The channel icon could not be retrieved (optional, not an error)
    IconUnavailable { reason: String },

    /// Stale `.partial` files were removed from the archive
    PartialFilesCleanedUp { count: usize },

    /// Files past the retention window were deleted
    FilesPurged { name: String, paths: Vec<PathBuf> },

    /// A thumbnail was normalized to JPEG
    ThumbnailConverted { path: PathBuf },

    /// A thumbnail could not be normalized; the original is used
    ThumbnailConversionFailed { path: PathBuf, error: String },

    /// A metadata sidecar could not be parsed; its item is left out
    MetadataParseFailed { path: PathBuf, error: String },

    /// A show or episode `.nfo` file was created
    NfoWritten { path: PathBuf },

    /// The feed document of a subscription was rendered
    FeedWritten {
        name: String,
        path: PathBuf,
        episode_count: usize,
    },

    /// A subscription stopped early because of an error
    SubscriptionFailed { name: String, error: String },

    /// Synchronization of a subscription finished
    SyncCompleted {
        name: String,
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },

    /// The index page was written
    IndexWritten {
        path: PathBuf,
        subscription_count: usize,
    },

    /// The index page could not be written
    IndexFailed { path: PathBuf, error: String },
}

/// Trait for reporting progress events.
///
/// Implementations can use this to display progress, log messages,
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

/// Reporter that keeps every event, for inspection after a run
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the events reported so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_handles_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::SubscriptionStarted {
            name: "demo".to_string(),
        });
        reporter.report(ProgressEvent::DownloadFailed {
            label: "abc - Episode".to_string(),
            error: "HTTP Error 403".to_string(),
        });
        reporter.report(ProgressEvent::SyncCompleted {
            name: "demo".to_string(),
            downloaded_count: 1,
            skipped_count: 2,
            failed_count: 0,
        });
    }

    #[test]
    fn collecting_reporter_keeps_order() {
        let reporter = CollectingReporter::new();
        let shared: SharedProgressReporter = reporter.clone();

        shared.report(ProgressEvent::SubscriptionStarted {
            name: "demo".to_string(),
        });
        shared.report(ProgressEvent::PartialFilesCleanedUp { count: 2 });

        assert_eq!(
            reporter.events(),
            vec![
                ProgressEvent::SubscriptionStarted {
                    name: "demo".to_string()
                },
                ProgressEvent::PartialFilesCleanedUp { count: 2 },
            ]
        );
    }
}
