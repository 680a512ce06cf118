// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::extract::EntryInfo;

/// Suffix of the metadata sidecar the engine writes next to each media file
pub const SIDECAR_SUFFIX: &str = ".info.json";

/// Suffix of files being written and not yet moved into place
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Archive state of one remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No marker file and not live: download it
    Unseen,
    /// Live stream in progress: skip, retry next run
    Live,
    /// Marker file present: skip
    AlreadyArchived,
}

/// Content of a marker file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub subscription_name: String,
    pub archived_at: String,
}

/// Decide what to do with an entry
///
/// The marker file is the only record of a finished download.
pub fn classify(info: &EntryInfo, marker_path: &Path) -> EntryState {
    let archived = marker_path.is_file();

    if !archived && !info.is_live {
        EntryState::Unseen
    } else if info.is_live {
        EntryState::Live
    } else {
        EntryState::AlreadyArchived
    }
}

/// Record an entry as archived. Call only after its download succeeded.
pub fn write_marker(
    marker_path: &Path,
    info: &EntryInfo,
    subscription_name: &str,
) -> Result<(), StateError> {
    let marker = Marker {
        id: info.id.clone(),
        title: info.title.clone(),
        subscription_name: subscription_name.to_string(),
        archived_at: Utc::now().to_rfc3339(),
    };

    let json = serde_json::to_vec(&marker).map_err(|e| StateError::MarkerEncodeFailed {
        path: marker_path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(marker_path, json).map_err(|e| StateError::WriteFailed {
        path: marker_path.to_path_buf(),
        source: e,
    })
}

/// Create a directory and its parents if missing
pub fn ensure_dir(dir: &Path) -> Result<(), StateError> {
    std::fs::create_dir_all(dir).map_err(|e| StateError::CreateDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// All metadata sidecars in an archive directory, sorted by file name
///
/// A missing directory has no sidecars.
pub fn list_sidecars(dir: &Path) -> Result<Vec<PathBuf>, StateError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut sidecars: Vec<PathBuf> = read_dir_files(dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.ends_with(SIDECAR_SUFFIX))
        })
        .collect();

    sidecars.sort();
    Ok(sidecars)
}

/// Regular files directly inside `dir`
pub fn read_dir_files(dir: &Path) -> Result<Vec<PathBuf>, StateError> {
    let entries = std::fs::read_dir(dir).map_err(|e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    Ok(files)
}

/// Remove `.partial` files left behind by an interrupted run
pub fn clean_partial_files(dir: &Path) -> Result<usize, StateError> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut cleaned = 0;
    for path in read_dir_files(dir)? {
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX));

        if is_partial && std::fs::remove_file(&path).is_ok() {
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

/// Path used while `path` is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Write a file completely before replacing the previous version
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    let partial = partial_path(path);

    std::fs::write(&partial, contents).map_err(|e| StateError::WriteFailed {
        path: partial.clone(),
        source: e,
    })?;

    std::fs::rename(&partial, path).map_err(|e| StateError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
