// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory extraction engine for tests

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ExtractError;

use super::engine::Extractor;
use super::options::ExtractOptions;

pub(crate) const SOURCE_URL: &str = "https://video.example/@demo";

#[derive(Debug, Clone)]
pub(crate) struct FakeItem {
    pub id: String,
    pub title: String,
    pub upload_date: String,
    pub ext: String,
    pub live: bool,
    pub fail_download: bool,
    pub filtered: bool,
}

impl FakeItem {
    pub fn new(id: &str, upload_date: &str) -> Self {
        Self {
            id: id.to_string(),
            title: format!("Episode {id}"),
            upload_date: upload_date.to_string(),
            ext: "mp4".to_string(),
            live: false,
            fail_download: false,
            filtered: false,
        }
    }

    pub fn url(&self) -> String {
        format!("https://video.example/watch/{}", self.id)
    }

    fn stem(&self) -> String {
        format!("{} [{}]", self.title, self.id)
    }
}

pub(crate) struct FakeExtractor {
    archive_dir: PathBuf,
    items: Mutex<Vec<FakeItem>>,
    extractor_name: String,
    fail_list: bool,
    about: Option<Value>,
    downloads: Mutex<Vec<String>>,
    probes: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new(archive_dir: impl Into<PathBuf>, items: Vec<FakeItem>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            items: Mutex::new(items),
            extractor_name: "youtube:tab".to_string(),
            fail_list: false,
            about: None,
            downloads: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_extractor_name(mut self, name: &str) -> Self {
        self.extractor_name = name.to_string();
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn with_about(mut self, about: Value) -> Self {
        self.about = Some(about);
        self
    }

    pub fn update_item(&self, id: &str, update: impl FnOnce(&mut FakeItem)) {
        let mut items = self.items.lock().unwrap();
        if let Some(item) = items.iter_mut().find(|item| item.id == id) {
            update(item);
        }
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    fn item_for(&self, url: &str) -> Option<FakeItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.url() == url)
            .cloned()
    }

    fn write_item(&self, item: &FakeItem) {
        std::fs::create_dir_all(&self.archive_dir).unwrap();
        let stem = item.stem();
        std::fs::write(
            self.archive_dir.join(format!("{stem}.{}", item.ext)),
            b"media",
        )
        .unwrap();
        let sidecar = json!({
            "id": item.id,
            "title": item.title,
            "upload_date": item.upload_date,
            "ext": item.ext,
            "format": "137 - 1920x1080",
            "duration": 125,
        });
        std::fs::write(
            self.archive_dir.join(format!("{stem}.info.json")),
            serde_json::to_vec(&sidecar).unwrap(),
        )
        .unwrap();
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn list(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError> {
        if self.fail_list {
            return Err(ExtractError::ExitStatus {
                program: "fake".to_string(),
                url: url.to_string(),
                status: 1,
                stderr: "ERROR: unable to enumerate".to_string(),
            });
        }

        if url.ends_with("/about") {
            return Ok(self.about.clone());
        }

        let mut items = self.items.lock().unwrap().clone();
        if options.playlist_reverse {
            items.reverse();
        }

        let entries: Vec<Value> = items
            .iter()
            .map(|item| json!({"_type": "url", "id": item.id, "url": item.url(), "title": item.title}))
            .collect();

        Ok(Some(json!({
            "_type": "playlist",
            "extractor": self.extractor_name,
            "uploader_url": "https://video.example/@demo",
            "entries": entries,
        })))
    }

    async fn probe(
        &self,
        url: &str,
        _options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError> {
        self.probes.lock().unwrap().push(url.to_string());

        let Some(item) = self.item_for(url) else {
            return Ok(None);
        };
        if item.filtered {
            return Ok(None);
        }

        let filename = self
            .archive_dir
            .join(format!("{}.{}", item.stem(), item.ext));

        Ok(Some(json!({
            "id": item.id,
            "title": item.title,
            "webpage_url": item.url(),
            "upload_date": item.upload_date,
            "is_live": item.live,
            "_filename": filename.to_string_lossy(),
        })))
    }

    async fn download(&self, url: &str, _options: &ExtractOptions) -> Result<(), ExtractError> {
        self.downloads.lock().unwrap().push(url.to_string());

        if url == SOURCE_URL {
            let items = self.items.lock().unwrap().clone();
            for item in items {
                self.write_item(&item);
            }
            return Ok(());
        }

        let item = self.item_for(url).ok_or_else(|| ExtractError::ExitStatus {
            program: "fake".to_string(),
            url: url.to_string(),
            status: 1,
            stderr: "ERROR: unknown item".to_string(),
        })?;

        if item.fail_download {
            return Err(ExtractError::ExitStatus {
                program: "fake".to_string(),
                url: url.to_string(),
                status: 1,
                stderr: "ERROR: HTTP Error 403".to_string(),
            });
        }

        self.write_item(&item);
        Ok(())
    }
}
