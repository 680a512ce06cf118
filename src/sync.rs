// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::Subscription;
use crate::error::{ExtractError, SyncError};
use crate::extract::{EntryInfo, ExtractOptions, Extractor, RemoteEntry, enumerate, probe_entry};
use crate::http::HttpClient;
use crate::icon::fetch_icon;
use crate::metadata::ThumbnailConverter;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{EntryState, classify, clean_partial_files, ensure_dir, write_marker};

/// An entry archived during this run
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedEntry {
    pub id: String,
    pub title: Option<String>,
    /// Media file as announced by the engine before download
    pub media_path: PathBuf,
    pub marker_path: PathBuf,
}

/// Result of synchronizing one subscription
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Entries newly archived, in processing order
    pub downloaded: Vec<ArchivedEntry>,
    /// Entries skipped because their marker exists
    pub already_archived: usize,
    /// Live entries left for a later run
    pub live_skipped: usize,
    /// Entries the engine returned no metadata for
    pub filtered_out: usize,
    /// Details of failed entries (label, error message)
    pub failed: Vec<(String, String)>,
    /// Processing stopped at the first failure
    pub aborted: bool,
}

/// Archive every new entry of a subscription
///
/// This is the main entry point of the synchronizer. It:
/// 1. Enumerates the source without downloading
/// 2. Stores the channel icon if there is none yet
/// 3. Downloads the whole source at once for flat playlists
/// 4. Otherwise resolves, classifies and downloads the newest entries one
///    by one, writing a marker after each successful download
///
/// An enumeration failure is reported and yields an empty result.
/// Filesystem errors are returned.
pub async fn sync_subscription<E, C, T>(
    extractor: &E,
    client: &C,
    converter: &T,
    subscription: &Subscription,
    today: NaiveDate,
    reporter: &SharedProgressReporter,
) -> Result<SyncResult, SyncError>
where
    E: Extractor + ?Sized,
    C: HttpClient + ?Sized,
    T: ThumbnailConverter + ?Sized,
{
    let name = subscription.name.as_str();
    let url = subscription.source_url()?;
    let archive_dir = subscription.archive_dir()?;
    let options = ExtractOptions::for_subscription(subscription, today)?;

    let cleaned = clean_partial_files(&archive_dir)?;
    if cleaned > 0 {
        reporter.report(ProgressEvent::PartialFilesCleanedUp { count: cleaned });
    }

    reporter.report(ProgressEvent::EnumeratingSource {
        name: name.to_string(),
        url: url.to_string(),
    });

    let listing = match enumerate(extractor, url, &options).await {
        Ok(listing) => listing,
        Err(e) => {
            reporter.report(ProgressEvent::EnumerationFailed {
                name: name.to_string(),
                error: e.to_string(),
            });
            return Ok(finish(name, SyncResult::default(), reporter));
        }
    };

    ensure_dir(&archive_dir)?;

    match fetch_icon(
        extractor,
        client,
        converter,
        &archive_dir,
        listing.uploader_url.as_deref(),
        &options,
    )
    .await
    {
        Ok(Some(path)) => reporter.report(ProgressEvent::IconFetched { path }),
        Ok(None) => {}
        Err(e) => reporter.report(ProgressEvent::IconUnavailable {
            reason: e.to_string(),
        }),
    }

    let mut result = SyncResult::default();

    if listing.is_playlist() && (listing.is_generic_playlist() || subscription.download_as_playlist)
    {
        reporter.report(ProgressEvent::DownloadingPlaylist {
            name: name.to_string(),
            url: url.to_string(),
        });
        if let Err(e) = extractor.download(url, &options).await {
            record_failure(&mut result, url.to_string(), &e, reporter);
        }
        return Ok(finish(name, result, reporter));
    }

    let total_entries = listing.entries.len();
    let mut entries = listing.entries;
    if let Some(last) = subscription.download_last
        && !subscription.initialize
    {
        entries.truncate(last);
    }
    let to_consider = entries.len();

    reporter.report(ProgressEvent::SourceEnumerated {
        name: name.to_string(),
        total_entries,
        to_consider,
    });

    for (entry_index, entry) in entries.iter().enumerate() {
        let outcome = process_entry(
            extractor,
            entry,
            &options,
            subscription,
            entry_index,
            to_consider,
            reporter,
        )
        .await?;

        match outcome {
            EntryOutcome::Downloaded(archived) => result.downloaded.push(archived),
            EntryOutcome::FilteredOut => {
                if !subscription.quiet {
                    reporter.report(ProgressEvent::EntryFilteredOut {
                        url: entry.url.clone(),
                    });
                }
                result.filtered_out += 1;
            }
            EntryOutcome::Live(label) => {
                if !subscription.quiet {
                    reporter.report(ProgressEvent::EntryLiveSkipped { label });
                }
                result.live_skipped += 1;
            }
            EntryOutcome::AlreadyArchived(label) => {
                if !subscription.quiet {
                    reporter.report(ProgressEvent::EntryAlreadyArchived { label });
                }
                result.already_archived += 1;
            }
            EntryOutcome::Failed { label, error } => {
                record_failure(&mut result, label, &error, reporter);
                if !subscription.ignore_errors {
                    result.aborted = true;
                    break;
                }
            }
        }
    }

    Ok(finish(name, result, reporter))
}

/// What happened to one entry of the source
#[derive(Debug)]
enum EntryOutcome {
    Downloaded(ArchivedEntry),
    /// No metadata: outside the date window, title filter, or unreachable
    FilteredOut,
    Live(String),
    AlreadyArchived(String),
    Failed { label: String, error: ExtractError },
}

/// Resolve, classify and possibly download a single entry
///
/// Only filesystem errors are returned as `Err`; engine errors become
/// [`EntryOutcome::Failed`].
async fn process_entry<E: Extractor + ?Sized>(
    extractor: &E,
    entry: &RemoteEntry,
    options: &ExtractOptions,
    subscription: &Subscription,
    entry_index: usize,
    total_entries: usize,
    reporter: &SharedProgressReporter,
) -> Result<EntryOutcome, SyncError> {
    let info = match probe_entry(extractor, &entry.url, options).await {
        Ok(Some(info)) => info,
        Ok(None) => return Ok(EntryOutcome::FilteredOut),
        Err(error) => {
            return Ok(EntryOutcome::Failed {
                label: entry_label(entry),
                error,
            });
        }
    };

    let label = info.label();
    let (Some(media_path), Some(marker_path)) = (info.filename.clone(), info.marker_path()) else {
        return Ok(EntryOutcome::Failed {
            label,
            error: ExtractError::MissingField {
                url: entry.url.clone(),
                field: "_filename",
            },
        });
    };

    match classify(&info, &marker_path) {
        EntryState::Live => Ok(EntryOutcome::Live(label)),
        EntryState::AlreadyArchived => Ok(EntryOutcome::AlreadyArchived(label)),
        EntryState::Unseen => {
            reporter.report(ProgressEvent::DownloadStarting {
                label: label.clone(),
                entry_index,
                total_entries,
            });

            let download_url = download_url(&info, entry);
            if let Err(error) = extractor.download(download_url, options).await {
                return Ok(EntryOutcome::Failed { label, error });
            }

            write_marker(&marker_path, &info, &subscription.name)?;
            reporter.report(ProgressEvent::DownloadCompleted { label });
            Ok(EntryOutcome::Downloaded(ArchivedEntry {
                id: info.id.clone(),
                title: info.title.clone(),
                media_path,
                marker_path,
            }))
        }
    }
}

fn download_url<'a>(info: &'a EntryInfo, entry: &'a RemoteEntry) -> &'a str {
    info.webpage_url.as_deref().unwrap_or(&entry.url)
}

fn entry_label(entry: &RemoteEntry) -> String {
    match (&entry.id, &entry.title) {
        (Some(id), Some(title)) => format!("{id} - {title}"),
        (Some(id), None) => id.clone(),
        _ => entry.url.clone(),
    }
}

fn record_failure(
    result: &mut SyncResult,
    label: String,
    error: &ExtractError,
    reporter: &SharedProgressReporter,
) {
    reporter.report(ProgressEvent::DownloadFailed {
        label: label.clone(),
        error: error.to_string(),
    });
    result.failed.push((label, error.to_string()));
}

fn finish(name: &str, result: SyncResult, reporter: &SharedProgressReporter) -> SyncResult {
    reporter.report(ProgressEvent::SyncCompleted {
        name: name.to_string(),
        downloaded_count: result.downloaded.len(),
        skipped_count: result.already_archived + result.live_skipped + result.filtered_out,
        failed_count: result.failed.len(),
    });
    result
}
