// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{MetadataError, StateError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{SIDECAR_SUFFIX, list_sidecars, read_dir_files};

use super::thumbnail::{
    ThumbnailConverter, declared_thumbnail_extension, normalize_thumbnail,
    resolve_thumbnail_extension,
};

/// Extensions never taken for the media file when scanning the directory
const NON_MEDIA_EXTENSIONS: [&str; 10] = [
    "json", "jpg", "jpeg", "png", "webp", "meta", "nfo", "part", "ytdl", "partial",
];

/// Marker the engines put in `format` for audio-only downloads
const AUDIO_ONLY_FORMAT: &str = "audio only";

/// Fields read from an engine-written `.info.json`
#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    upload_date: Option<String>,
    ext: Option<String>,
    format: Option<String>,
    acodec: Option<String>,
    audio_ext: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

/// Normalized description of one archived episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub title: String,
    pub id: String,
    /// Midnight UTC of the upload date
    pub published: Option<DateTime<Utc>>,
    /// Extension of the media file as found on disk
    pub extension: String,
    pub description: Option<String>,
    /// Thumbnail filename, JPEG when conversion succeeded
    pub thumbnail: Option<String>,
    /// Media filename inside the archive directory
    pub filename: String,
    /// `H:MM:SS`
    pub duration: Option<String>,
    pub duration_secs: Option<u64>,
}

impl EpisodeRecord {
    /// Publish date in RFC-822 form
    pub fn pub_date(&self) -> Option<String> {
        self.published
            .map(|published| published.format("%a, %d %b %Y %H:%M:%S +0000").to_string())
    }

    /// Publish date as `YYYY-MM-DD`
    pub fn aired(&self) -> Option<String> {
        self.published
            .map(|published| published.format("%Y-%m-%d").to_string())
    }

    /// Media filename without its extension
    pub fn stem(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.filename)
    }
}

/// Parse one metadata sidecar into an episode record
///
/// Returns `None` for playlist sidecars. Non-JPEG thumbnails are converted
/// as a side effect.
pub async fn parse_sidecar<T: ThumbnailConverter + ?Sized>(
    path: &Path,
    converter: &T,
    reporter: &SharedProgressReporter,
) -> Result<Option<EpisodeRecord>, MetadataError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MetadataError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let sidecar: Sidecar =
        serde_json::from_str(&content).map_err(|e| MetadataError::JsonParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    if sidecar.kind.as_deref() == Some("playlist") {
        return Ok(None);
    }

    let missing = |field: &'static str| MetadataError::MissingField {
        path: path.to_path_buf(),
        field,
    };
    let id = sidecar.id.clone().ok_or_else(|| missing("id"))?;
    let title = sidecar.title.clone().ok_or_else(|| missing("title"))?;

    let dir = path.parent().unwrap_or(Path::new("."));
    let basename = sidecar_basename(path).ok_or_else(|| missing("file name"))?;

    let published = sidecar
        .upload_date
        .as_deref()
        .map(|date| parse_upload_date(path, date))
        .transpose()?;

    let mut thumbnail = None;
    let mut thumbnail_ext = None;
    if let Some(url) = sidecar.thumbnail.as_deref() {
        let ext = resolve_thumbnail_extension(dir, &basename, &declared_thumbnail_extension(url));
        let filename = format!("{basename}.{ext}");
        thumbnail = Some(normalize_thumbnail(converter, dir, &filename, reporter).await);
        thumbnail_ext = Some(ext);
    }

    let mut extension = declared_media_extension(&sidecar, dir, &basename)
        .ok_or_else(|| missing("ext"))?;
    if !dir.join(format!("{basename}.{extension}")).is_file()
        && let Some(found) = scan_media_extension(dir, &basename, thumbnail_ext.as_deref())
    {
        extension = found;
    }

    let duration_secs = sidecar
        .duration
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs as u64);

    Ok(Some(EpisodeRecord {
        title,
        id,
        published,
        filename: format!("{basename}.{extension}"),
        extension,
        description: sidecar.description,
        thumbnail,
        duration: duration_secs.map(format_duration),
        duration_secs,
    }))
}

/// Parse every sidecar in an archive directory
///
/// A sidecar that cannot be parsed is reported and left out.
pub async fn collect_records<T: ThumbnailConverter + ?Sized>(
    dir: &Path,
    converter: &T,
    reporter: &SharedProgressReporter,
) -> Result<Vec<EpisodeRecord>, StateError> {
    let mut records = Vec::new();

    for path in list_sidecars(dir)? {
        match parse_sidecar(&path, converter, reporter).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => reporter.report(ProgressEvent::MetadataParseFailed {
                path,
                error: e.to_string(),
            }),
        }
    }

    Ok(records)
}

/// `"Title [id].info.json"` -> `"Title [id]"`
fn sidecar_basename(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(SIDECAR_SUFFIX))
        .map(String::from)
}

fn parse_upload_date(path: &Path, date: &str) -> Result<DateTime<Utc>, MetadataError> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| MetadataError::InvalidDate {
            path: path.to_path_buf(),
            date: date.to_string(),
        })
}

/// Audio codec for audio-only downloads present on disk, else the declared
/// container extension
fn declared_media_extension(sidecar: &Sidecar, dir: &Path, basename: &str) -> Option<String> {
    let audio_only = sidecar
        .format
        .as_deref()
        .is_some_and(|format| format.contains(AUDIO_ONLY_FORMAT));

    if audio_only
        && let Some(codec) = sidecar.acodec.as_deref().or(sidecar.audio_ext.as_deref())
        && dir.join(format!("{basename}.{codec}")).is_file()
    {
        return Some(codec.to_string());
    }

    sidecar.ext.clone()
}

/// Extension of the first media-looking file sharing the basename
///
/// Post-processing (audio extraction, remuxing) may change the extension
/// after the sidecar was written.
fn scan_media_extension(dir: &Path, basename: &str, thumbnail_ext: Option<&str>) -> Option<String> {
    let mut names: Vec<String> = read_dir_files(dir)
        .ok()?
        .iter()
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();
    names.sort();

    names
        .iter()
        .filter(|name| name.starts_with(basename))
        .filter_map(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .find(|ext| !NON_MEDIA_EXTENSIONS.contains(ext) && Some(*ext) != thumbnail_ext)
        .map(String::from)
}

/// Render seconds as `H:MM:SS`
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
