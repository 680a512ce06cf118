// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use serde_json::Value;

use crate::error::ExtractError;

use super::engine::Extractor;
use super::options::ExtractOptions;

/// Extension of the marker file recording an archived item
pub const MARKER_EXTENSION: &str = "meta";

/// One item as referenced by the source, before download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub url: String,
    pub id: Option<String>,
    pub title: Option<String>,
}

/// Flattened result of enumerating a source
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// `_type` of the root document (`playlist`, `video`, ...)
    pub kind: Option<String>,
    /// Name of the engine extractor that handled the source
    pub extractor: Option<String>,
    /// Channel page of the uploader, used for the podcast icon
    pub uploader_url: Option<String>,
    /// Items in enumeration order, nested playlists expanded
    pub entries: Vec<RemoteEntry>,
}

impl Listing {
    pub fn from_value(value: &Value) -> Self {
        let kind = str_field(value, "_type");
        let mut entries = Vec::new();

        match kind.as_deref() {
            Some("playlist") | Some("multi_video") => flatten_entries(value, &mut entries),
            _ => {
                // A single item: the source itself is the only entry
                if let Some(url) =
                    str_field(value, "webpage_url").or_else(|| str_field(value, "url"))
                {
                    entries.push(RemoteEntry {
                        url,
                        id: str_field(value, "id"),
                        title: str_field(value, "title"),
                    });
                }
            }
        }

        Self {
            kind,
            extractor: str_field(value, "extractor"),
            uploader_url: str_field(value, "uploader_url")
                .or_else(|| str_field(value, "channel_url")),
            entries,
        }
    }

    pub fn is_playlist(&self) -> bool {
        self.kind.as_deref() == Some("playlist")
    }

    /// A flat collection handled by the generic extractor
    ///
    /// Such sources cannot be itemized reliably and are downloaded as a
    /// whole.
    pub fn is_generic_playlist(&self) -> bool {
        self.is_playlist()
            && self
                .extractor
                .as_deref()
                .is_some_and(|extractor| extractor.eq_ignore_ascii_case("generic"))
    }
}

/// Expand nested playlists into a flat, ordered entry list
fn flatten_entries(value: &Value, entries: &mut Vec<RemoteEntry>) {
    let Some(items) = value.get("entries").and_then(Value::as_array) else {
        return;
    };

    for item in items {
        if item.is_null() {
            continue;
        }
        if str_field(item, "_type").as_deref() == Some("playlist") {
            flatten_entries(item, entries);
            continue;
        }
        if let Some(url) = str_field(item, "url").or_else(|| str_field(item, "webpage_url")) {
            entries.push(RemoteEntry {
                url,
                id: str_field(item, "id"),
                title: str_field(item, "title"),
            });
        }
    }
}

/// Full metadata of one item as reported by the engine
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub id: String,
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    /// Path the engine will write the media file to
    pub filename: Option<PathBuf>,
    /// Currently streaming or scheduled live broadcast
    pub is_live: bool,
    pub raw: Value,
}

impl EntryInfo {
    pub fn from_value(url: &str, value: Value) -> Result<Self, ExtractError> {
        let id = str_field(&value, "id").ok_or_else(|| ExtractError::MissingField {
            url: url.to_string(),
            field: "id",
        })?;

        let is_live = value.get("is_live").and_then(Value::as_bool) == Some(true)
            || matches!(
                value.get("live_status").and_then(Value::as_str),
                Some("is_live") | Some("is_upcoming")
            );

        Ok(Self {
            id,
            title: str_field(&value, "title"),
            webpage_url: str_field(&value, "webpage_url"),
            filename: str_field(&value, "_filename")
                .or_else(|| str_field(&value, "filename"))
                .map(PathBuf::from),
            is_live,
            raw: value,
        })
    }

    /// Marker file recording that this item has been archived
    pub fn marker_path(&self) -> Option<PathBuf> {
        self.filename
            .as_ref()
            .map(|filename| filename.with_extension(MARKER_EXTENSION))
    }

    pub fn label(&self) -> String {
        match &self.title {
            Some(title) => format!("{} - {}", self.id, title),
            None => self.id.clone(),
        }
    }
}

/// Enumerate a source without downloading anything
pub async fn enumerate<E: Extractor + ?Sized>(
    extractor: &E,
    url: &str,
    options: &ExtractOptions,
) -> Result<Listing, ExtractError> {
    let listing = extractor
        .list(url, options)
        .await?
        .map(|value| Listing::from_value(&value))
        .unwrap_or_default();
    Ok(listing)
}

/// Resolve one entry, `None` when the engine filtered it out
pub async fn probe_entry<E: Extractor + ?Sized>(
    extractor: &E,
    url: &str,
    options: &ExtractOptions,
) -> Result<Option<EntryInfo>, ExtractError> {
    extractor
        .probe(url, options)
        .await?
        .map(|value| EntryInfo::from_value(url, value))
        .transpose()
}

/// Read a string-ish field, accepting numbers as ids sometimes are
fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_playlists_in_order() {
        let value = json!({
            "_type": "playlist",
            "extractor": "youtube:tab",
            "uploader_url": "https://www.youtube.com/@demo",
            "entries": [
                {"_type": "url", "id": "a", "url": "https://youtu.be/a", "title": "A"},
                {
                    "_type": "playlist",
                    "entries": [
                        {"_type": "url", "id": "b", "url": "https://youtu.be/b"},
                        {"_type": "url", "id": "c", "url": "https://youtu.be/c"}
                    ]
                },
                null,
                {"_type": "url", "id": "d", "url": "https://youtu.be/d"}
            ]
        });

        let listing = Listing::from_value(&value);
        let ids: Vec<_> = listing
            .entries
            .iter()
            .map(|e| e.id.clone().unwrap())
            .collect();

        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(listing.entries[0].title.as_deref(), Some("A"));
        assert!(listing.is_playlist());
        assert!(!listing.is_generic_playlist());
        assert_eq!(
            listing.uploader_url.as_deref(),
            Some("https://www.youtube.com/@demo")
        );
    }

    #[test]
    fn generic_playlist_is_detected() {
        let value = json!({
            "_type": "playlist",
            "extractor": "generic",
            "entries": [{"url": "https://example.com/a.mp3"}]
        });

        assert!(Listing::from_value(&value).is_generic_playlist());
    }

    #[test]
    fn single_item_source_lists_itself() {
        let value = json!({
            "_type": "video",
            "id": "xyz",
            "title": "Lone video",
            "webpage_url": "https://www.youtube.com/watch?v=xyz"
        });

        let listing = Listing::from_value(&value);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].url, "https://www.youtube.com/watch?v=xyz");
    }

    #[test]
    fn entry_info_reads_filename_and_marker() {
        let value = json!({
            "id": "abc",
            "title": "Episode",
            "webpage_url": "https://www.youtube.com/watch?v=abc",
            "_filename": "/srv/pods/demo/Episode [abc][20240115].webm"
        });

        let info = EntryInfo::from_value("https://youtu.be/abc", value).unwrap();

        assert_eq!(info.id, "abc");
        assert!(!info.is_live);
        assert_eq!(
            info.marker_path(),
            Some(PathBuf::from("/srv/pods/demo/Episode [abc][20240115].meta"))
        );
        assert_eq!(info.label(), "abc - Episode");
    }

    #[test]
    fn entry_info_detects_live_streams() {
        let live = json!({"id": "a", "is_live": true});
        let upcoming = json!({"id": "b", "live_status": "is_upcoming"});
        let finished = json!({"id": "c", "is_live": false, "live_status": "was_live"});

        assert!(EntryInfo::from_value("u", live).unwrap().is_live);
        assert!(EntryInfo::from_value("u", upcoming).unwrap().is_live);
        assert!(!EntryInfo::from_value("u", finished).unwrap().is_live);
    }

    #[test]
    fn entry_info_requires_id() {
        let result = EntryInfo::from_value("u", json!({"title": "no id"}));
        assert!(matches!(
            result,
            Err(ExtractError::MissingField { field: "id", .. })
        ));
    }
}
