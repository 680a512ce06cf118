// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::error::ExtractError;

use super::options::ExtractOptions;

/// Exit status of both engines when `--max-downloads` was reached
const MAX_DOWNLOADS_REACHED: i32 = 101;

/// Extraction engine abstraction
///
/// `list` and `probe` never download media. They return `None` when the
/// engine produced no metadata at all. For `probe` that includes items the
/// engine could not reach (private, removed, members-only).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Describe a source as a single JSON document, playlists left flat
    async fn list(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError>;

    /// Resolve the full metadata of a single item
    async fn probe(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError>;

    /// Download an item (or a whole playlist) with its sidecar and thumbnail
    async fn download(&self, url: &str, options: &ExtractOptions) -> Result<(), ExtractError>;
}

/// Supported extraction engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    YtDlp,
    YoutubeDl,
}

impl Engine {
    /// Binary name looked up on `PATH`
    pub fn binary_name(self) -> &'static str {
        match self {
            Engine::YtDlp => "yt-dlp",
            Engine::YoutubeDl => "youtube-dl",
        }
    }

    /// Recognize a configured module name like `yt_dlp` or `youtube-dl`
    fn from_module_name(name: &str) -> Option<Self> {
        match name.replace('_', "-").as_str() {
            "yt-dlp" => Some(Engine::YtDlp),
            "youtube-dl" => Some(Engine::YoutubeDl),
            _ => None,
        }
    }
}

/// Extractor driving an engine's command line interface
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    engine: Engine,
    program: String,
}

impl CommandExtractor {
    pub fn new(engine: Engine, program: impl Into<String>) -> Self {
        Self {
            engine,
            program: program.into(),
        }
    }

    /// Pick the engine from the configured selector
    ///
    /// The selector is either an engine name or a path to an engine binary.
    /// Without one, the first engine found on `PATH` wins, `yt-dlp` first.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some(selector) => match Engine::from_module_name(selector) {
                Some(engine) => Self::new(engine, engine.binary_name()),
                None => {
                    let file_name = Path::new(selector)
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let engine = if file_name.starts_with("youtube-dl")
                        || file_name.starts_with("youtube_dl")
                    {
                        Engine::YoutubeDl
                    } else {
                        Engine::YtDlp
                    };
                    Self::new(engine, selector)
                }
            },
            None => [Engine::YtDlp, Engine::YoutubeDl]
                .into_iter()
                .find(|engine| is_on_path(engine.binary_name()))
                .map(|engine| Self::new(engine, engine.binary_name()))
                .unwrap_or_else(|| Self::new(Engine::YtDlp, Engine::YtDlp.binary_name())),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a flat, simulated listing of a source
    pub fn list_args(&self, url: &str, options: &ExtractOptions) -> Vec<String> {
        let mut args = self.selection_args(options);
        args.extend(
            ["--simulate", "--dump-single-json", "--flat-playlist", "--ignore-errors"]
                .map(String::from),
        );
        args.push(url.to_string());
        args
    }

    /// Arguments for resolving one item without downloading it
    pub fn probe_args(&self, url: &str, options: &ExtractOptions) -> Vec<String> {
        let mut args = self.selection_args(options);
        args.extend(
            ["--simulate", "--dump-json", "--flat-playlist", "--ignore-errors"].map(String::from),
        );
        args.push(url.to_string());
        args
    }

    /// Arguments for downloading
    pub fn download_args(&self, url: &str, options: &ExtractOptions) -> Vec<String> {
        let mut args = self.selection_args(options);

        if options.write_info_json {
            args.push("--write-info-json".to_string());
        }
        if options.write_thumbnail {
            args.push("--write-thumbnail".to_string());
        }
        if options.ignore_errors {
            args.push("--ignore-errors".to_string());
        }
        if options.quiet {
            args.push("--quiet".to_string());
            args.push("--no-warnings".to_string());
        }
        if let Some(audio) = &options.extract_audio {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(audio.codec.clone());
            args.push("--audio-quality".to_string());
            args.push(audio.quality.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Arguments shared by every invocation: what to select and where it goes
    fn selection_args(&self, options: &ExtractOptions) -> Vec<String> {
        let mut args = vec![
            "--output".to_string(),
            options.output_template.to_string_lossy().to_string(),
        ];

        if let Some(format) = &options.format {
            args.push("--format".to_string());
            args.push(format.clone());
        }
        if let Some(date) = options.date_after {
            args.push("--dateafter".to_string());
            args.push(date.format("%Y%m%d").to_string());
        }
        if let Some(max) = options.max_downloads {
            args.push("--max-downloads".to_string());
            args.push(max.to_string());
        }
        if options.playlist_reverse {
            args.push("--playlist-reverse".to_string());
        }
        if let Some(pattern) = &options.match_title {
            match self.engine {
                Engine::YoutubeDl => {
                    args.push("--match-title".to_string());
                    args.push(pattern.clone());
                }
                Engine::YtDlp => {
                    args.push("--match-filters".to_string());
                    args.push(format!("title ~= (?i){pattern}"));
                }
            }
        }

        args.extend(passthrough_args(&options.passthrough));
        args
    }

    async fn run(&self, args: &[String]) -> Result<Output, ExtractError> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExtractError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            })
    }

    fn status_error(&self, url: &str, output: &Output) -> ExtractError {
        ExtractError::ExitStatus {
            program: self.program.clone(),
            url: url.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: last_line(&output.stderr),
        }
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    async fn list(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError> {
        let output = self.run(&self.list_args(url, options)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let document = stdout.trim();

        if document.is_empty() || document == "null" {
            if output.status.success() {
                return Ok(None);
            }
            return Err(self.status_error(url, &output));
        }

        serde_json::from_str(document)
            .map(Some)
            .map_err(|e| ExtractError::JsonParseFailed {
                url: url.to_string(),
                source: e,
            })
    }

    async fn probe(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Option<Value>, ExtractError> {
        let output = self.run(&self.probe_args(url, options)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // Unreachable items print nothing and exit non-zero
        let Some(line) = stdout.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Ok(None);
        };

        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| ExtractError::JsonParseFailed {
                url: url.to_string(),
                source: e,
            })
    }

    async fn download(&self, url: &str, options: &ExtractOptions) -> Result<(), ExtractError> {
        let output = self.run(&self.download_args(url, options)).await?;

        match output.status.code() {
            Some(0) | Some(MAX_DOWNLOADS_REACHED) => Ok(()),
            _ => Err(self.status_error(url, &output)),
        }
    }
}

/// Translate raw engine options into command line flags
///
/// `snake_case` keys become `--kebab-case` flags. `true` is a bare flag,
/// `false` and `null` are omitted, arrays repeat the flag per element.
fn passthrough_args(options: &Map<String, Value>) -> Vec<String> {
    let mut args = Vec::new();

    for (key, value) in options {
        let flag = format!("--{}", key.trim_start_matches('-').replace('_', "-"));
        match value {
            Value::Bool(true) => args.push(flag),
            Value::Bool(false) | Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    args.push(flag.clone());
                    args.push(scalar_to_arg(item));
                }
            }
            other => {
                args.push(flag);
                args.push(scalar_to_arg(other));
            }
        }
    }

    args
}

fn scalar_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

fn is_on_path(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}
