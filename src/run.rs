// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::config::{Config, RawSubscription, Subscription, resolve};
use crate::error::SyncError;
use crate::extract::Extractor;
use crate::feed::{FeedOptions, listed_names, write_feed, write_index, write_stylesheet};
use crate::http::HttpClient;
use crate::metadata::{ThumbnailConverter, collect_records, write_nfo_files};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::retention::sweep;
use crate::sync::{SyncResult, sync_subscription};

/// Which subscriptions take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Only these names, when set
    pub filter: Option<Vec<String>>,
    /// Never these names
    pub exclude: Vec<String>,
}

impl Selection {
    /// Build from comma-separated name lists
    pub fn from_lists(filter: Option<&str>, exclude: Option<&str>) -> Self {
        let split = |list: &str| -> Vec<String> {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect()
        };

        Self {
            filter: filter.map(split),
            exclude: exclude.map(split).unwrap_or_default(),
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        let wanted = self
            .filter
            .as_ref()
            .is_none_or(|filter| filter.iter().any(|n| n == name));
        wanted && !self.exclude.iter().any(|n| n == name)
    }
}

/// External collaborators of a run
pub struct Services<'a> {
    pub extractor: &'a dyn Extractor,
    pub client: &'a dyn HttpClient,
    pub converter: &'a dyn ThumbnailConverter,
}

/// What happened to one processed subscription
#[derive(Debug, Clone)]
pub struct SubscriptionOutcome {
    pub name: String,
    /// `None` for feed-only subscriptions
    pub sync: Option<SyncResult>,
    pub purged: Vec<PathBuf>,
    pub feed_path: PathBuf,
    pub episode_count: usize,
}

/// Result of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: Vec<SubscriptionOutcome>,
    /// Subscriptions left out (name, reason)
    pub skipped: Vec<(String, String)>,
    /// Subscriptions that stopped early (name, error)
    pub failed: Vec<(String, String)>,
    pub index_path: Option<PathBuf>,
}

/// Process every configured subscription in order
///
/// Failures never cross from one subscription to the next; the worst a
/// subscription can do is leave its previous feed in place.
pub async fn run(
    config: &Config,
    selection: &Selection,
    services: &Services<'_>,
    now: DateTime<Local>,
    reporter: &SharedProgressReporter,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for raw in &config.subscriptions {
        let name = raw.name.clone().unwrap_or_default();

        if !selection.includes(&name) {
            skip(&mut summary, name, "not selected".to_string(), reporter);
            continue;
        }

        let subscription = match resolve(config, raw) {
            Ok(subscription) => subscription,
            Err(e) => {
                skip(&mut summary, name, e.to_string(), reporter);
                continue;
            }
        };

        reporter.report(ProgressEvent::SubscriptionStarted { name: name.clone() });

        match process_subscription(config, &subscription, services, now, reporter).await {
            Ok(outcome) => summary.processed.push(outcome),
            Err(e) => {
                reporter.report(ProgressEvent::SubscriptionFailed {
                    name: name.clone(),
                    error: e.to_string(),
                });
                summary.failed.push((name, e.to_string()));
            }
        }
    }

    if config.index_enabled
        && let Some(output_dir) = &config.output_dir
    {
        summary.index_path = write_index_page(output_dir, &config.subscriptions, reporter);
    }

    summary
}

/// Download, sweep and render one subscription
async fn process_subscription(
    config: &Config,
    subscription: &Subscription,
    services: &Services<'_>,
    now: DateTime<Local>,
    reporter: &SharedProgressReporter,
) -> Result<SubscriptionOutcome, SyncError> {
    let today = now.date_naive();

    let sync = if subscription.skip_download {
        None
    } else {
        Some(
            sync_subscription(
                services.extractor,
                services.client,
                services.converter,
                subscription,
                today,
                reporter,
            )
            .await?,
        )
    };

    let purged = sweep(subscription, today)?;
    if !purged.is_empty() {
        reporter.report(ProgressEvent::FilesPurged {
            name: subscription.name.clone(),
            paths: purged.clone(),
        });
    }

    let records =
        collect_records(&subscription.archive_dir()?, services.converter, reporter).await?;

    write_nfo_files(subscription, &records, reporter)?;

    if config.style_rss_feed
        && let Some(path) = write_stylesheet(subscription.output_root()?)?
    {
        reporter.report(ProgressEvent::StylesheetWritten { path });
    }

    let options = FeedOptions {
        style_rss_feed: config.style_rss_feed,
    };
    let feed_path = write_feed(
        subscription,
        &records,
        &options,
        now.with_timezone(&Utc),
        reporter,
    )?;

    Ok(SubscriptionOutcome {
        name: subscription.name.clone(),
        sync,
        purged,
        feed_path,
        episode_count: records.len(),
    })
}

fn skip(
    summary: &mut RunSummary,
    name: String,
    reason: String,
    reporter: &SharedProgressReporter,
) {
    reporter.report(ProgressEvent::SubscriptionSkipped {
        name: name.clone(),
        reason: reason.clone(),
    });
    summary.skipped.push((name, reason));
}

fn write_index_page(
    output_dir: &Path,
    subscriptions: &[RawSubscription],
    reporter: &SharedProgressReporter,
) -> Option<PathBuf> {
    match write_index(output_dir, subscriptions) {
        Ok(path) => {
            reporter.report(ProgressEvent::IndexWritten {
                path: path.clone(),
                subscription_count: listed_names(subscriptions).count(),
            });
            Some(path)
        }
        Err(e) => {
            reporter.report(ProgressEvent::IndexFailed {
                path: output_dir.to_path_buf(),
                error: e.to_string(),
            });
            None
        }
    }
}
