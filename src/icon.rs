// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::ICON_FILENAME;
use crate::error::{DownloadError, IconError, StateError};
use crate::extract::{ExtractOptions, Extractor};
use crate::http::HttpClient;
use crate::metadata::ThumbnailConverter;
use crate::state::partial_path;

/// Thumbnail id of the full-size channel avatar
const AVATAR_THUMBNAIL_ID: &str = "avatar_uncropped";

/// Store the channel artwork as `icon.jpg` in the archive directory
///
/// Returns `Ok(None)` if an icon is already present. The image is streamed
/// to a `.partial` file first so an interrupted run never leaves a broken
/// icon behind.
pub async fn fetch_icon<E, C, T>(
    extractor: &E,
    client: &C,
    converter: &T,
    archive_dir: &Path,
    uploader_url: Option<&str>,
    options: &ExtractOptions,
) -> Result<Option<PathBuf>, IconError>
where
    E: Extractor + ?Sized,
    C: HttpClient + ?Sized,
    T: ThumbnailConverter + ?Sized,
{
    let icon_path = archive_dir.join(ICON_FILENAME);
    if icon_path.is_file() {
        return Ok(None);
    }

    let channel = uploader_url.ok_or(IconError::NoChannel)?;
    let about_url = format!("{}/about", channel.trim_end_matches('/'));

    let about = extractor
        .list(&about_url, &options.for_channel_page())
        .await?;
    let thumbnail_url = about
        .as_ref()
        .and_then(channel_thumbnail)
        .ok_or_else(|| IconError::NoThumbnail(about_url.clone()))?;

    let partial = partial_path(&icon_path);
    let content_type = download_to_file(client, &thumbnail_url, &partial).await?;

    if is_jpeg(&thumbnail_url, content_type.as_deref()) {
        std::fs::rename(&partial, &icon_path).map_err(|e| StateError::WriteFailed {
            path: icon_path.clone(),
            source: e,
        })?;
    } else {
        let converted = converter.convert_to_jpeg(&partial, &icon_path).await;
        let _ = std::fs::remove_file(&partial);
        converted?;
    }

    Ok(Some(icon_path))
}

/// Pick the channel artwork from an `about` page listing
///
/// Prefers the uncropped avatar, then the last listed thumbnail (engines
/// list them smallest first), then the single `thumbnail` field.
fn channel_thumbnail(about: &Value) -> Option<String> {
    let thumbnails = about
        .get("thumbnails")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let url_of = |thumbnail: &Value| {
        thumbnail
            .get("url")
            .and_then(Value::as_str)
            .map(String::from)
    };

    thumbnails
        .iter()
        .find(|t| t.get("id").and_then(Value::as_str) == Some(AVATAR_THUMBNAIL_ID))
        .and_then(url_of)
        .or_else(|| thumbnails.iter().rev().find_map(url_of))
        .or_else(|| {
            about
                .get("thumbnail")
                .and_then(Value::as_str)
                .map(String::from)
        })
}

fn is_jpeg(url: &str, content_type: Option<&str>) -> bool {
    if let Some(content_type) = content_type {
        return content_type.contains("jpeg");
    }

    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    path.ends_with(".jpg") || path.ends_with(".jpeg")
}

/// Stream a URL to a file, returning the response content type
async fn download_to_file<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
) -> Result<Option<String>, DownloadError> {
    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let mut file =
        File::create(output_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

    let mut stream = response.body;
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(response.content_type)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::fake::FakeExtractor;
    use crate::http::{ByteStream, HttpResponse};
    use crate::metadata::thumbnail::{CopyConverter, FailingConverter};
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    pub(crate) struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
        content_type: Option<String>,
        requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub(crate) fn new(data: &[u8], status: u16, content_type: Option<&str>) -> Self {
            Self {
                response_data: data.to_vec(),
                status,
                content_type: content_type.map(String::from),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            let data = self.response_data.clone();

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_type: self.content_type.clone(),
                body: stream,
            })
        }
    }

    fn options(dir: &Path) -> ExtractOptions {
        ExtractOptions {
            output_template: dir.join("%(title)s.%(ext)s"),
            write_info_json: true,
            write_thumbnail: true,
            ignore_errors: false,
            quiet: false,
            match_title: None,
            date_after: None,
            max_downloads: None,
            playlist_reverse: false,
            format: None,
            extract_audio: None,
            passthrough: Default::default(),
        }
    }

    fn about_page() -> Value {
        json!({
            "id": "UCdemo",
            "thumbnails": [
                {"id": "0", "url": "https://img.example/avatar_s88.jpg"},
                {"id": "avatar_uncropped", "url": "https://img.example/avatar_full.jpg"},
                {"id": "banner_uncropped", "url": "https://img.example/banner.jpg"},
            ],
        })
    }

    #[test]
    fn prefers_uncropped_avatar() {
        assert_eq!(
            channel_thumbnail(&about_page()).as_deref(),
            Some("https://img.example/avatar_full.jpg")
        );
    }

    #[test]
    fn falls_back_to_last_thumbnail_then_single_field() {
        let listed = json!({"thumbnails": [
            {"url": "https://img.example/small.jpg"},
            {"url": "https://img.example/large.jpg"},
        ]});
        assert_eq!(
            channel_thumbnail(&listed).as_deref(),
            Some("https://img.example/large.jpg")
        );

        let single = json!({"thumbnail": "https://img.example/only.png"});
        assert_eq!(
            channel_thumbnail(&single).as_deref(),
            Some("https://img.example/only.png")
        );

        assert_eq!(channel_thumbnail(&json!({"id": "x"})), None);
    }

    #[test]
    fn jpeg_detection() {
        assert!(is_jpeg("https://img.example/a.png", Some("image/jpeg")));
        assert!(!is_jpeg("https://img.example/a.jpg", Some("image/webp")));
        assert!(is_jpeg("https://img.example/a.JPG?size=900", None));
        assert!(!is_jpeg("https://img.example/a", None));
    }

    #[tokio::test]
    async fn stores_jpeg_icon() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new()).with_about(about_page());
        let client = MockHttpClient::new(b"jpeg-bytes", 200, Some("image/jpeg"));

        let stored = fetch_icon(
            &extractor,
            &client,
            &FailingConverter,
            dir.path(),
            Some("https://video.example/@demo/"),
            &options(dir.path()),
        )
        .await
        .unwrap();

        let icon_path = dir.path().join(ICON_FILENAME);
        assert_eq!(stored, Some(icon_path.clone()));
        assert_eq!(std::fs::read(&icon_path).unwrap(), b"jpeg-bytes");
        assert!(!partial_path(&icon_path).exists());
        assert_eq!(client.requests(), vec!["https://img.example/avatar_full.jpg"]);
    }

    #[tokio::test]
    async fn converts_non_jpeg_icon() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new())
            .with_about(json!({"thumbnail": "https://img.example/avatar.webp"}));
        let client = MockHttpClient::new(b"webp-bytes", 200, Some("image/webp"));

        fetch_icon(
            &extractor,
            &client,
            &CopyConverter,
            dir.path(),
            Some("https://video.example/@demo"),
            &options(dir.path()),
        )
        .await
        .unwrap();

        let icon_path = dir.path().join(ICON_FILENAME);
        assert!(icon_path.is_file());
        assert!(!partial_path(&icon_path).exists());
    }

    #[tokio::test]
    async fn existing_icon_is_kept() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(ICON_FILENAME), b"old").unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new()).with_about(about_page());
        let client = MockHttpClient::new(b"new", 200, Some("image/jpeg"));

        let stored = fetch_icon(
            &extractor,
            &client,
            &FailingConverter,
            dir.path(),
            Some("https://video.example/@demo"),
            &options(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(stored, None);
        assert!(client.requests().is_empty());
        assert_eq!(std::fs::read(dir.path().join(ICON_FILENAME)).unwrap(), b"old");
    }

    #[tokio::test]
    async fn missing_channel_is_reported() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new());
        let client = MockHttpClient::new(b"", 200, None);

        let result = fetch_icon(
            &extractor,
            &client,
            &FailingConverter,
            dir.path(),
            None,
            &options(dir.path()),
        )
        .await;

        assert!(matches!(result, Err(IconError::NoChannel)));
    }

    #[tokio::test]
    async fn http_error_leaves_no_icon() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new()).with_about(about_page());
        let client = MockHttpClient::new(b"not found", 404, Some("text/html"));

        let result = fetch_icon(
            &extractor,
            &client,
            &FailingConverter,
            dir.path(),
            Some("https://video.example/@demo"),
            &options(dir.path()),
        )
        .await;

        assert!(matches!(
            result,
            Err(IconError::Download(DownloadError::HttpStatus { status: 404, .. }))
        ));
        assert!(!dir.path().join(ICON_FILENAME).exists());
    }

    #[tokio::test]
    async fn failed_conversion_removes_partial() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(dir.path(), Vec::new())
            .with_about(json!({"thumbnail": "https://img.example/avatar.png"}));
        let client = MockHttpClient::new(b"png", 200, Some("image/png"));

        let result = fetch_icon(
            &extractor,
            &client,
            &FailingConverter,
            dir.path(),
            Some("https://video.example/@demo"),
            &options(dir.path()),
        )
        .await;

        let icon_path = dir.path().join(ICON_FILENAME);
        assert!(matches!(result, Err(IconError::Convert(_))));
        assert!(!icon_path.exists());
        assert!(!partial_path(&icon_path).exists());
    }
}
