// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {0} not found")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config {path}: {source}")]
    YamlParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse JSON config override: {0}")]
    JsonOverrideFailed(#[source] serde_json::Error),

    #[error("Configuration must be a mapping")]
    NotAMapping,

    #[error("No valid configuration found")]
    Empty,

    #[error("Invalid configuration: {0}")]
    Invalid(#[source] serde_json::Error),
}

/// Errors that make a single subscription unusable for this run
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Subscription is missing a name")]
    MissingName,

    #[error("Subscription '{name}' is missing required field '{field}'")]
    MissingField { name: String, field: &'static str },

    #[error("Subscription '{name}' has an invalid url_root '{url_root}': {source}")]
    InvalidUrlRoot {
        name: String,
        url_root: String,
        #[source]
        source: url::ParseError,
    },

    #[error("url_root '{0}' cannot carry path segments")]
    UrlRootNotABase(String),
}

/// Errors that can occur when invoking the extraction engine
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status} for {url}: {stderr}")]
    ExitStatus {
        program: String,
        url: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to parse engine output for {url}: {source}")]
    JsonParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Engine output for {url} has no '{field}' field")]
    MissingField { url: String, field: &'static str },
}

/// Errors that can occur when downloading files over HTTP
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that can occur when converting a thumbnail image
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converting {path} failed: {stderr}")]
    Failed { path: PathBuf, stderr: String },
}

/// Reasons the channel icon could not be stored
#[derive(Error, Debug)]
pub enum IconError {
    #[error("Source reports no channel page")]
    NoChannel,

    #[error("Channel page {0} lists no thumbnail")]
    NoThumbnail(String),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Errors that can occur when reading a metadata sidecar
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read metadata file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metadata file {path} has no {field}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Invalid upload date '{date}' in {path}")]
    InvalidDate { path: PathBuf, date: String },
}

/// Errors that can occur when touching the archive directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode marker {path}: {source}")]
    MarkerEncodeFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to stat {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when writing rendered output
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Top-level errors for processing one subscription
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}
