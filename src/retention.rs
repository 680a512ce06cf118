// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate};

use crate::config::Subscription;
use crate::error::{StateError, SyncError};
use crate::state::read_dir_files;

/// Delete archive files older than the subscription's retention window
///
/// No-op without `retention_days` or while initializing.
pub fn sweep(subscription: &Subscription, today: NaiveDate) -> Result<Vec<PathBuf>, SyncError> {
    let Some(retention_days) = subscription.retention_days else {
        return Ok(Vec::new());
    };
    if subscription.initialize {
        return Ok(Vec::new());
    }

    let dir = subscription.archive_dir()?;
    Ok(sweep_dir(&dir, retention_days, today)?)
}

/// Delete every regular file in `dir` last modified before `today - retention_days`
///
/// Modification times are compared as local calendar dates. Files are not
/// grouped by item: media, sidecar, thumbnail and marker age independently.
/// Returns the deleted paths sorted; a missing directory yields nothing.
pub fn sweep_dir(
    dir: &Path,
    retention_days: u32,
    today: NaiveDate,
) -> Result<Vec<PathBuf>, StateError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let cutoff = today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN);

    let mut deleted = Vec::new();
    for path in read_dir_files(dir)? {
        let modified = std::fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| StateError::StatFailed {
                path: path.clone(),
                source: e,
            })?;

        let modified_on = DateTime::<Local>::from(modified).date_naive();
        if modified_on < cutoff {
            std::fs::remove_file(&path).map_err(|e| StateError::RemoveFailed {
                path: path.clone(),
                source: e,
            })?;
            deleted.push(path);
        }
    }

    deleted.sort();
    Ok(deleted)
}
