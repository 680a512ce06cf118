// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use html_escape::encode_double_quoted_attribute;

use crate::config::{ICON_FILENAME, Subscription};
use crate::error::{RenderError, StateError};
use crate::metadata::EpisodeRecord;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{ensure_dir, write_atomic};

const ITUNES_NAMESPACE: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// File name of the shared feed stylesheet
pub const STYLESHEET_FILENAME: &str = "style.xsl";

const STYLESHEET: &str = include_str!("templates/style.xsl");

/// Rendering switches taken from the global configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Reference `style.xsl` so browsers show a readable page
    pub style_rss_feed: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            style_rss_feed: true,
        }
    }
}

/// Render the RSS document of a subscription
///
/// Items are ordered newest first, undated items last. Apart from the
/// `updated` element the output only depends on `records` and the archive
/// directory's icon.
pub fn render_feed(
    subscription: &Subscription,
    records: &[EpisodeRecord],
    options: &FeedOptions,
    now: DateTime<Utc>,
) -> Result<String, RenderError> {
    let mut sorted: Vec<&EpisodeRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.published.cmp(&a.published));

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    if options.style_rss_feed {
        xml.push_str(&format!(
            "<?xml-stylesheet type=\"text/xsl\" href=\"{STYLESHEET_FILENAME}\"?>\n"
        ));
    }
    xml.push_str(&format!(
        "<rss version=\"2.0\" xmlns:itunes=\"{ITUNES_NAMESPACE}\">\n"
    ));
    xml.push_str("  <channel>\n");
    xml.push_str(&format!("    <updated>{}</updated>\n", now.to_rfc2822()));
    xml.push_str(&format!("    <title>{}</title>\n", cdata(&subscription.name)));
    xml.push_str(&format!(
        "    <link>{}</link>\n",
        cdata(subscription.url.as_deref().unwrap_or_default())
    ));
    xml.push_str(&format!(
        "    <description>{}</description>\n",
        cdata(&subscription.name)
    ));

    if subscription.archive_dir()?.join(ICON_FILENAME).is_file() {
        let icon_url = subscription.media_url(ICON_FILENAME)?;
        xml.push_str(&format!(
            "    <itunes:image href=\"{}\"/>\n",
            attr(icon_url.as_str())
        ));
    }

    for record in sorted {
        render_item(&mut xml, subscription, record)?;
    }

    xml.push_str("  </channel>\n");
    xml.push_str("</rss>\n");
    Ok(xml)
}

fn render_item(
    xml: &mut String,
    subscription: &Subscription,
    record: &EpisodeRecord,
) -> Result<(), RenderError> {
    let media_type = if subscription.audio_only {
        format!("audio/{}", record.extension)
    } else {
        format!("video/{}", record.extension)
    };
    let media_url = subscription.media_url(&record.filename)?;

    xml.push_str("    <item>\n");
    xml.push_str(&format!(
        "      <guid isPermaLink=\"false\">{}</guid>\n",
        cdata(&record.id)
    ));
    xml.push_str(&format!("      <title>{}</title>\n", cdata(&record.title)));
    xml.push_str(&format!(
        "      <enclosure url=\"{}\" type=\"{}\"/>\n",
        attr(media_url.as_str()),
        attr(&media_type)
    ));
    if let Some(pub_date) = record.pub_date() {
        xml.push_str(&format!("      <pubDate>{pub_date}</pubDate>\n"));
    }
    if let Some(thumbnail) = &record.thumbnail {
        let thumbnail_url = subscription.media_url(thumbnail)?;
        xml.push_str(&format!(
            "      <itunes:image href=\"{}\"/>\n",
            attr(thumbnail_url.as_str())
        ));
    }
    if let Some(description) = &record.description {
        xml.push_str(&format!(
            "      <itunes:summary>{}</itunes:summary>\n",
            cdata(description)
        ));
    }
    if let Some(duration) = &record.duration {
        xml.push_str(&format!(
            "      <itunes:duration>{duration}</itunes:duration>\n"
        ));
    }
    xml.push_str("    </item>\n");
    Ok(())
}

/// Wrap text in CDATA, splitting any `]]>` it contains
fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn attr(text: &str) -> String {
    encode_double_quoted_attribute(text).into_owned()
}

/// Render and store `<output_dir>/<name>.xml`, replacing the previous feed
/// only once the new one is completely written
pub fn write_feed(
    subscription: &Subscription,
    records: &[EpisodeRecord],
    options: &FeedOptions,
    now: DateTime<Utc>,
    reporter: &SharedProgressReporter,
) -> Result<PathBuf, RenderError> {
    let xml = render_feed(subscription, records, options, now)?;
    let path = subscription.feed_path()?;

    ensure_dir(subscription.output_root()?)?;
    write_atomic(&path, xml.as_bytes())?;

    reporter.report(ProgressEvent::FeedWritten {
        name: subscription.name.clone(),
        path: path.clone(),
        episode_count: records.len(),
    });

    Ok(path)
}

/// Store the shared stylesheet in `output_dir` unless it is already current
///
/// Returns the path when the file was (re)written.
pub fn write_stylesheet(output_dir: &Path) -> Result<Option<PathBuf>, StateError> {
    let path = output_dir.join(STYLESHEET_FILENAME);
    if std::fs::read(&path).is_ok_and(|current| current == STYLESHEET.as_bytes()) {
        return Ok(None);
    }

    ensure_dir(output_dir)?;
    write_atomic(&path, STYLESHEET.as_bytes())?;
    Ok(Some(path))
}
