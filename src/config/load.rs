// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Global configuration as read from disk
///
/// Only the keys listed here are understood; unknown keys are ignored so a
/// config file shared with other tooling still loads.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub url_root: Option<String>,
    pub best: Option<bool>,
    pub format: Option<String>,
    pub filename_template: Option<String>,
    #[serde(default = "default_true")]
    pub style_rss_feed: bool,
    #[serde(default)]
    pub index_enabled: bool,
    /// Extraction engine selector: `yt-dlp`, `youtube-dl`, or a binary path
    #[serde(rename = "youtube-dl-module")]
    pub engine: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub ydl_options: Option<Map<String, Value>>,
    #[serde(default)]
    pub subscriptions: Vec<RawSubscription>,
}

/// One entry of the `subscriptions` list, before defaults are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubscription {
    pub name: Option<String>,
    pub url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub url_root: Option<String>,
    pub retention_days: Option<u32>,
    pub download_last: Option<usize>,
    pub initialize: Option<bool>,
    pub audio_only: Option<bool>,
    pub format: Option<String>,
    pub best: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub quiet: Option<bool>,
    pub filename_template: Option<String>,
    pub ydl_options: Option<Map<String, Value>>,
    pub nfo_files: Option<bool>,
    pub skip_download: Option<bool>,
    pub private: Option<bool>,
    pub pretty_name: Option<String>,
    pub matchtitle: Option<String>,
    pub download_as_playlist: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Load the YAML config file and apply a JSON override on top of it
///
/// Top-level keys of `json_override` replace the ones from the file. A
/// missing file is tolerated as long as the override alone yields a
/// configuration.
pub fn load_config(path: &Path, json_override: &str) -> Result<Config, ConfigError> {
    let overrides = match serde_json::from_str::<Value>(json_override)
        .map_err(ConfigError::JsonOverrideFailed)?
    {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(ConfigError::NotAMapping),
    };

    let mut merged = if path.is_file() {
        read_yaml_mapping(path)?
    } else if overrides.is_empty() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    } else {
        Map::new()
    };

    merged.extend(overrides);

    if merged.is_empty() {
        return Err(ConfigError::Empty);
    }

    serde_json::from_value(Value::Object(merged)).map_err(ConfigError::Invalid)
}

fn read_yaml_mapping(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value: Value =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ConfigError::NotAMapping),
    }
}
