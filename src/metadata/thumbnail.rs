// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ConvertError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Thumbnail extensions probed on disk, after the declared one
pub const THUMBNAIL_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Image conversion abstraction for testability
#[async_trait]
pub trait ThumbnailConverter: Send + Sync {
    /// Write a JPEG version of `source` to `target`, keeping `source`
    async fn convert_to_jpeg(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;
}

/// Converter shelling out to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: String,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl ThumbnailConverter for FfmpegConverter {
    async fn convert_to_jpeg(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let output = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(source)
            .args(["-frames:v", "1"])
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ConvertError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ConvertError::Failed {
                path: source.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Extension of a thumbnail URL, ignoring query and fragment
pub fn declared_thumbnail_extension(thumbnail_url: &str) -> String {
    let path = thumbnail_url
        .split(['?', '#'])
        .next()
        .unwrap_or(thumbnail_url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "jpg".to_string(),
    }
}

/// Find the thumbnail extension actually present on disk
///
/// Tries the declared extension, then the common image extensions, and
/// falls back to the declared one when nothing exists.
pub fn resolve_thumbnail_extension(dir: &Path, basename: &str, declared: &str) -> String {
    std::iter::once(declared)
        .chain(THUMBNAIL_EXTENSIONS)
        .find(|ext| dir.join(format!("{basename}.{ext}")).is_file())
        .unwrap_or(declared)
        .to_string()
}

/// Make sure a JPEG version of a thumbnail exists and return its filename
///
/// Best effort: on failure the original filename is returned. The original
/// file is never removed.
pub async fn normalize_thumbnail<T: ThumbnailConverter + ?Sized>(
    converter: &T,
    dir: &Path,
    filename: &str,
    reporter: &SharedProgressReporter,
) -> String {
    let Some((stem, ext)) = filename.rsplit_once('.') else {
        return filename.to_string();
    };
    if ext == "jpg" || ext == "jpeg" {
        return filename.to_string();
    }

    let jpeg_filename = format!("{stem}.jpg");
    let target = dir.join(&jpeg_filename);
    if target.is_file() {
        return jpeg_filename;
    }

    let source = dir.join(filename);
    if !source.is_file() {
        return filename.to_string();
    }

    match converter.convert_to_jpeg(&source, &target).await {
        Ok(()) => {
            reporter.report(ProgressEvent::ThumbnailConverted { path: target });
            jpeg_filename
        }
        Err(e) => {
            reporter.report(ProgressEvent::ThumbnailConversionFailed {
                path: source,
                error: e.to_string(),
            });
            filename.to_string()
        }
    }
}

/// Converter that copies bytes, standing in for ffmpeg in tests
#[cfg(test)]
pub(crate) struct CopyConverter;

#[cfg(test)]
#[async_trait]
impl ThumbnailConverter for CopyConverter {
    async fn convert_to_jpeg(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        std::fs::copy(source, target).map_err(|e| ConvertError::SpawnFailed {
            program: "copy".to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// Converter that always fails
#[cfg(test)]
pub(crate) struct FailingConverter;

#[cfg(test)]
#[async_trait]
impl ThumbnailConverter for FailingConverter {
    async fn convert_to_jpeg(&self, source: &Path, _target: &Path) -> Result<(), ConvertError> {
        Err(ConvertError::Failed {
            path: source.to_path_buf(),
            stderr: "Invalid data found when processing input".to_string(),
        })
    }
}
