// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use html_escape::encode_text;

use crate::config::Subscription;
use crate::error::{RenderError, StateError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::write_atomic;

use super::sidecar::EpisodeRecord;

/// Show-level sidecar read by media-library tools
pub const SHOW_NFO_FILENAME: &str = "tvshow.nfo";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Write the show and episode `.nfo` files that do not exist yet
///
/// Existing files are never touched, they may carry edits made in the
/// media library. Does nothing for audio-only subscriptions or when
/// `nfo_files` is off. Returns the files written.
pub fn write_nfo_files(
    subscription: &Subscription,
    records: &[EpisodeRecord],
    reporter: &SharedProgressReporter,
) -> Result<Vec<PathBuf>, RenderError> {
    if !subscription.nfo_files || subscription.audio_only {
        return Ok(Vec::new());
    }

    let dir = subscription.archive_dir()?;
    let show_title = subscription.display_title();
    let mut written = Vec::new();

    let show_path = dir.join(SHOW_NFO_FILENAME);
    if write_if_absent(&show_path, &render_show_nfo(show_title))? {
        written.push(show_path);
    }

    for record in records {
        let path = dir.join(format!("{}.nfo", record.stem()));
        if write_if_absent(&path, &render_episode_nfo(record, show_title))? {
            written.push(path);
        }
    }

    for path in &written {
        reporter.report(ProgressEvent::NfoWritten { path: path.clone() });
    }

    Ok(written)
}

fn write_if_absent(path: &Path, contents: &str) -> Result<bool, StateError> {
    if path.exists() {
        return Ok(false);
    }
    write_atomic(path, contents.as_bytes())?;
    Ok(true)
}

fn render_show_nfo(title: &str) -> String {
    format!(
        "{XML_DECLARATION}\n<tvshow>\n  <title>{}</title>\n</tvshow>\n",
        encode_text(title)
    )
}

fn render_episode_nfo(record: &EpisodeRecord, show_title: &str) -> String {
    let mut nfo = format!("{XML_DECLARATION}\n<episodedetails>\n");
    nfo.push_str(&format!("  <title>{}</title>\n", encode_text(&record.title)));
    if let Some(aired) = record.aired() {
        nfo.push_str(&format!("  <aired>{aired}</aired>\n"));
    }
    nfo.push_str(&format!(
        "  <showtitle>{}</showtitle>\n",
        encode_text(show_title)
    ));
    if let Some(secs) = record.duration_secs {
        nfo.push_str(&format!("  <runtime>{}</runtime>\n", (secs + 30) / 60));
    }
    if let Some(duration) = &record.duration {
        nfo.push_str(&format!("  <duration>{duration}</duration>\n"));
    }
    nfo.push_str("</episodedetails>\n");
    nfo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CollectingReporter, NoopReporter};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;
    use url::Url;

    fn make_subscription(output_dir: &Path) -> Subscription {
        Subscription {
            url: Some("https://video.example/@demo".to_string()),
            output_dir: Some(output_dir.to_path_buf()),
            url_root: Some(Url::parse("https://pods.example.com").unwrap()),
            nfo_files: true,
            ..Subscription::defaults("demo")
        }
    }

    fn make_record() -> EpisodeRecord {
        EpisodeRecord {
            title: "Fish & Chips <live>".to_string(),
            id: "abc".to_string(),
            published: Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()),
            extension: "mp4".to_string(),
            description: None,
            thumbnail: None,
            filename: "Fish & Chips [abc].mp4".to_string(),
            duration: Some("0:02:05".to_string()),
            duration_secs: Some(125),
        }
    }

    #[test]
    fn writes_show_and_episode_files() {
        let dir = tempdir().unwrap();
        let subscription = Subscription {
            pretty_name: Some("The Demo Show".to_string()),
            ..make_subscription(dir.path())
        };
        std::fs::create_dir_all(dir.path().join("demo")).unwrap();
        let reporter = CollectingReporter::new();
        let shared: SharedProgressReporter = reporter.clone();

        let written = write_nfo_files(&subscription, &[make_record()], &shared).unwrap();

        let show = dir.path().join("demo").join(SHOW_NFO_FILENAME);
        let episode = dir.path().join("demo").join("Fish & Chips [abc].nfo");
        assert_eq!(written, vec![show.clone(), episode.clone()]);
        assert_eq!(reporter.events().len(), 2);

        let show_nfo = std::fs::read_to_string(show).unwrap();
        assert!(show_nfo.contains("<title>The Demo Show</title>"));

        let episode_nfo = std::fs::read_to_string(episode).unwrap();
        assert!(episode_nfo.contains("<title>Fish &amp; Chips &lt;live&gt;</title>"));
        assert!(episode_nfo.contains("<aired>2024-01-15</aired>"));
        assert!(episode_nfo.contains("<showtitle>The Demo Show</showtitle>"));
        assert!(episode_nfo.contains("<runtime>2</runtime>"));
        assert!(episode_nfo.contains("<duration>0:02:05</duration>"));
    }

    #[test]
    fn existing_files_are_never_overwritten() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("demo");
        std::fs::create_dir_all(&archive).unwrap();
        std::fs::write(archive.join(SHOW_NFO_FILENAME), "custom").unwrap();
        std::fs::write(archive.join("Fish & Chips [abc].nfo"), "edited").unwrap();

        let written = write_nfo_files(
            &make_subscription(dir.path()),
            &[make_record()],
            &NoopReporter::shared(),
        )
        .unwrap();

        assert!(written.is_empty());
        assert_eq!(
            std::fs::read_to_string(archive.join(SHOW_NFO_FILENAME)).unwrap(),
            "custom"
        );
        assert_eq!(
            std::fs::read_to_string(archive.join("Fish & Chips [abc].nfo")).unwrap(),
            "edited"
        );
    }

    #[test]
    fn disabled_for_audio_only_and_when_off() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("demo")).unwrap();

        let audio = Subscription {
            audio_only: true,
            ..make_subscription(dir.path())
        };
        let off = Subscription {
            nfo_files: false,
            ..make_subscription(dir.path())
        };

        for subscription in [audio, off] {
            let written =
                write_nfo_files(&subscription, &[make_record()], &NoopReporter::shared()).unwrap();
            assert!(written.is_empty());
        }
        assert!(!dir.path().join("demo").join(SHOW_NFO_FILENAME).exists());
    }

    #[test]
    fn undated_episode_has_no_aired_date() {
        let record = EpisodeRecord {
            published: None,
            duration: None,
            duration_secs: None,
            ..make_record()
        };

        let nfo = render_episode_nfo(&record, "demo");

        assert!(!nfo.contains("<aired>"));
        assert!(!nfo.contains("<runtime>"));
        assert!(nfo.contains("<showtitle>demo</showtitle>"));
    }
}
