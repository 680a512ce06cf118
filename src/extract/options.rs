// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use serde_json::{Map, Value};

use crate::config::Subscription;
use crate::error::SubscriptionError;

/// Audio quality passed to the audio extraction post-step (0 best, 10 worst)
const AUDIO_QUALITY: &str = "5";

/// Engine-neutral option set for one subscription
///
/// Concrete engines translate this into their own invocation syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Absolute output template, `<output_dir>/<name>/<filename_template>`
    pub output_template: PathBuf,
    pub write_info_json: bool,
    pub write_thumbnail: bool,
    pub ignore_errors: bool,
    pub quiet: bool,
    pub match_title: Option<String>,
    /// Only items uploaded on or after this date
    pub date_after: Option<NaiveDate>,
    pub max_downloads: Option<usize>,
    /// Oldest items first
    pub playlist_reverse: bool,
    pub format: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    /// Raw engine options from the configuration
    pub passthrough: Map<String, Value>,
}

/// Audio extraction post-processing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    pub quality: String,
}

impl ExtractOptions {
    /// Derive the option set for a subscription
    ///
    /// Date and count filters are only applied outside of initialization;
    /// an initializing subscription is enumerated oldest first instead.
    pub fn for_subscription(
        subscription: &Subscription,
        today: NaiveDate,
    ) -> Result<Self, SubscriptionError> {
        let output_template = subscription
            .archive_dir()?
            .join(&subscription.filename_template);

        let date_after = subscription
            .retention_days
            .filter(|_| !subscription.initialize)
            .map(|days| {
                today
                    .checked_sub_days(Days::new(u64::from(days)))
                    .unwrap_or(NaiveDate::MIN)
            });

        let max_downloads = subscription
            .download_last
            .filter(|_| !subscription.initialize);

        let (format, extract_audio) = if subscription.audio_only {
            let codec = subscription.format.as_deref().unwrap_or("best");
            (
                Some(format!("bestaudio/{codec}")),
                Some(AudioExtraction {
                    codec: codec.to_string(),
                    quality: AUDIO_QUALITY.to_string(),
                }),
            )
        } else {
            let format = subscription.format.as_ref().map(|format| {
                if subscription.best {
                    format!("bestvideo[ext={format}]")
                } else {
                    format.clone()
                }
            });
            (format, None)
        };

        Ok(Self {
            output_template,
            write_info_json: true,
            write_thumbnail: true,
            ignore_errors: subscription.ignore_errors,
            quiet: subscription.quiet,
            match_title: subscription.matchtitle.clone(),
            date_after,
            max_downloads,
            playlist_reverse: subscription.initialize,
            format,
            extract_audio,
            passthrough: subscription.ydl_options.clone(),
        })
    }

    /// Options for listing a channel page: no filters, no format selection
    pub fn for_channel_page(&self) -> Self {
        Self {
            output_template: self.output_template.clone(),
            write_info_json: false,
            write_thumbnail: false,
            ignore_errors: true,
            quiet: true,
            match_title: None,
            date_after: None,
            max_downloads: None,
            playlist_reverse: false,
            format: None,
            extract_audio: None,
            passthrough: self.passthrough.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn make_subscription() -> Subscription {
        Subscription {
            url: Some("https://www.youtube.com/@demo".to_string()),
            output_dir: Some(PathBuf::from("/srv/pods")),
            url_root: Some(Url::parse("https://pods.example.com").unwrap()),
            ..Subscription::defaults("demo")
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn channel_page_options_drop_filters() {
        let subscription = Subscription {
            retention_days: Some(7),
            download_last: Some(3),
            matchtitle: Some("Weekly".to_string()),
            format: Some("mp4".to_string()),
            ydl_options: json!({"cookiefile": "/srv/cookies.txt"})
                .as_object()
                .cloned()
                .unwrap(),
            ..make_subscription()
        };
        let options = ExtractOptions::for_subscription(&subscription, today()).unwrap();

        let channel = options.for_channel_page();

        assert_eq!(channel.date_after, None);
        assert_eq!(channel.max_downloads, None);
        assert_eq!(channel.match_title, None);
        assert_eq!(channel.format, None);
        assert_eq!(channel.passthrough, options.passthrough);
    }

    #[test]
    fn output_template_lives_in_archive_dir() {
        let options = ExtractOptions::for_subscription(&make_subscription(), today()).unwrap();

        assert_eq!(
            options.output_template,
            PathBuf::from("/srv/pods/demo/%(title)s [%(id)s][%(upload_date)s].%(ext)s")
        );
        assert!(options.write_info_json);
        assert!(options.write_thumbnail);
        assert!(!options.playlist_reverse);
    }

    #[test]
    fn retention_and_last_n_become_filters() {
        let sub = Subscription {
            retention_days: Some(7),
            download_last: Some(3),
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();

        assert_eq!(options.date_after, NaiveDate::from_ymd_opt(2024, 3, 8));
        assert_eq!(options.max_downloads, Some(3));
    }

    #[test]
    fn initialize_reverses_and_disables_filters() {
        let sub = Subscription {
            retention_days: Some(7),
            download_last: Some(3),
            initialize: true,
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();

        assert!(options.playlist_reverse);
        assert_eq!(options.date_after, None);
        assert_eq!(options.max_downloads, None);
    }

    #[test]
    fn audio_only_requests_best_audio_and_extraction() {
        let sub = Subscription {
            audio_only: true,
            format: Some("mp3".to_string()),
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();

        assert_eq!(options.format.as_deref(), Some("bestaudio/mp3"));
        assert_eq!(
            options.extract_audio,
            Some(AudioExtraction {
                codec: "mp3".to_string(),
                quality: "5".to_string(),
            })
        );
    }

    #[test]
    fn audio_only_without_format_uses_best() {
        let sub = Subscription {
            audio_only: true,
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();

        assert_eq!(options.format.as_deref(), Some("bestaudio/best"));
        assert_eq!(options.extract_audio.unwrap().codec, "best");
    }

    #[test]
    fn best_video_in_container() {
        let sub = Subscription {
            format: Some("mp4".to_string()),
            best: true,
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();
        assert_eq!(options.format.as_deref(), Some("bestvideo[ext=mp4]"));
        assert!(options.extract_audio.is_none());
    }

    #[test]
    fn raw_format_string_passes_verbatim() {
        let sub = Subscription {
            format: Some("22/18".to_string()),
            ..make_subscription()
        };

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();
        assert_eq!(options.format.as_deref(), Some("22/18"));
    }

    #[test]
    fn passthrough_options_are_carried() {
        let mut sub = make_subscription();
        sub.ydl_options
            .insert("cookiefile".to_string(), json!("/etc/cookies.txt"));

        let options = ExtractOptions::for_subscription(&sub, today()).unwrap();
        assert_eq!(options.passthrough["cookiefile"], json!("/etc/cookies.txt"));
    }

    #[test]
    fn missing_output_dir_is_an_error() {
        let sub = Subscription {
            output_dir: None,
            ..make_subscription()
        };

        assert!(ExtractOptions::for_subscription(&sub, today()).is_err());
    }
}
