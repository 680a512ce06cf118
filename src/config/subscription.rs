// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use serde_json::{Map, Value};
use url::Url;

use crate::error::SubscriptionError;

use super::load::{Config, RawSubscription};

/// Output filename template handed to the extraction engine
pub const DEFAULT_FILENAME_TEMPLATE: &str = "%(title)s [%(id)s][%(upload_date)s].%(ext)s";

/// Name of the channel icon inside an archive directory
pub const ICON_FILENAME: &str = "icon.jpg";

/// Fully resolved configuration of one subscription
///
/// Built fresh for every run by [`resolve`]; never written back anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub name: String,
    pub url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub url_root: Option<Url>,
    /// Keep archived files for this many days (None = forever)
    pub retention_days: Option<u32>,
    /// Only consider the newest N entries of the source
    pub download_last: Option<usize>,
    /// First run of a source: oldest entries first, no date/count filtering
    pub initialize: bool,
    pub audio_only: bool,
    pub format: Option<String>,
    pub best: bool,
    pub ignore_errors: bool,
    pub quiet: bool,
    pub filename_template: String,
    /// Passthrough options for the extraction engine
    pub ydl_options: Map<String, Value>,
    pub nfo_files: bool,
    pub skip_download: bool,
    /// Hide from the index page
    pub private: bool,
    pub pretty_name: Option<String>,
    pub matchtitle: Option<String>,
    pub download_as_playlist: bool,
}

impl Subscription {
    /// Built-in defaults for a subscription called `name`
    pub fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            output_dir: None,
            url_root: None,
            retention_days: None,
            download_last: None,
            initialize: false,
            audio_only: false,
            format: None,
            best: false,
            ignore_errors: false,
            quiet: true,
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            ydl_options: Map::new(),
            nfo_files: false,
            skip_download: false,
            private: false,
            pretty_name: None,
            matchtitle: None,
            download_as_playlist: false,
        }
    }

    /// Directory holding this subscription's archived files
    pub fn archive_dir(&self) -> Result<PathBuf, SubscriptionError> {
        Ok(self.output_root()?.join(&self.name))
    }

    /// Directory holding all feeds, the index, and the stylesheet
    pub fn output_root(&self) -> Result<&PathBuf, SubscriptionError> {
        self.output_dir
            .as_ref()
            .ok_or_else(|| self.missing("output_dir"))
    }

    /// Path of the rendered feed document
    pub fn feed_path(&self) -> Result<PathBuf, SubscriptionError> {
        Ok(self.output_root()?.join(format!("{}.xml", self.name)))
    }

    pub fn source_url(&self) -> Result<&str, SubscriptionError> {
        self.url.as_deref().ok_or_else(|| self.missing("url"))
    }

    /// Public URL of a file inside the archive directory
    ///
    /// Name and filename are percent-encoded as path segments.
    pub fn media_url(&self, filename: &str) -> Result<Url, SubscriptionError> {
        let mut url = self
            .url_root
            .clone()
            .ok_or_else(|| self.missing("url_root"))?;

        url.path_segments_mut()
            .map_err(|_| SubscriptionError::UrlRootNotABase(url_root_string(&self.url_root)))?
            .pop_if_empty()
            .push(&self.name)
            .push(filename);

        Ok(url)
    }

    /// Title used for the show in `.nfo` files
    pub fn display_title(&self) -> &str {
        self.pretty_name.as_deref().unwrap_or(&self.name)
    }

    fn missing(&self, field: &'static str) -> SubscriptionError {
        SubscriptionError::MissingField {
            name: self.name.clone(),
            field,
        }
    }
}

fn url_root_string(url_root: &Option<Url>) -> String {
    url_root.as_ref().map(Url::to_string).unwrap_or_default()
}

/// Resolve a raw subscription against the global config and built-ins
///
/// Precedence: subscription field, then whitelisted global field, then the
/// built-in default. An existing archive directory forces `initialize` off.
pub fn resolve(config: &Config, raw: &RawSubscription) -> Result<Subscription, SubscriptionError> {
    let name = raw
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(SubscriptionError::MissingName)?;

    let defaults = Subscription::defaults(name);

    let url_root = raw
        .url_root
        .as_ref()
        .or(config.url_root.as_ref())
        .map(|root| {
            let parsed = Url::parse(root).map_err(|e| SubscriptionError::InvalidUrlRoot {
                name: name.to_string(),
                url_root: root.clone(),
                source: e,
            })?;
            if parsed.cannot_be_a_base() {
                return Err(SubscriptionError::UrlRootNotABase(root.clone()));
            }
            Ok(parsed)
        })
        .transpose()?;

    let mut subscription = Subscription {
        name: name.to_string(),
        url: raw.url.clone(),
        output_dir: raw.output_dir.clone().or_else(|| config.output_dir.clone()),
        url_root,
        retention_days: raw.retention_days,
        download_last: raw.download_last,
        initialize: raw.initialize.unwrap_or(defaults.initialize),
        audio_only: raw.audio_only.unwrap_or(defaults.audio_only),
        format: raw.format.clone().or_else(|| config.format.clone()),
        best: raw.best.or(config.best).unwrap_or(defaults.best),
        ignore_errors: raw.ignore_errors.unwrap_or(defaults.ignore_errors),
        quiet: raw.quiet.unwrap_or(defaults.quiet),
        filename_template: raw
            .filename_template
            .clone()
            .or_else(|| config.filename_template.clone())
            .unwrap_or(defaults.filename_template),
        ydl_options: merge_options(config.ydl_options.as_ref(), raw.ydl_options.as_ref()),
        nfo_files: raw.nfo_files.unwrap_or(defaults.nfo_files),
        skip_download: raw.skip_download.unwrap_or(defaults.skip_download),
        private: raw.private.unwrap_or(defaults.private),
        pretty_name: raw.pretty_name.clone(),
        matchtitle: raw.matchtitle.clone(),
        download_as_playlist: raw
            .download_as_playlist
            .unwrap_or(defaults.download_as_playlist),
    };

    if !subscription.skip_download {
        subscription.source_url()?;
        subscription.output_root()?;
        if subscription.url_root.is_none() {
            return Err(subscription.missing("url_root"));
        }
    }

    if subscription.initialize
        && let Ok(archive_dir) = subscription.archive_dir()
        && archive_dir.is_dir()
    {
        subscription.initialize = false;
    }

    Ok(subscription)
}

/// Merge passthrough engine options, subscription keys winning
fn merge_options(
    global: Option<&Map<String, Value>>,
    local: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = global.cloned().unwrap_or_default();
    if let Some(local) = local {
        for (key, value) in local {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
