use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use ydlpod::{
    CommandExtractor, FfmpegConverter, NoopReporter, ProgressEvent, ProgressReporter,
    ReqwestClient, Selection, Services, SharedProgressReporter, load_config, run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[x] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Archive video channels with yt-dlp and publish them as podcast feeds
#[derive(Parser, Debug)]
#[command(name = "ydlpod")]
#[command(about = "Archive video channels with yt-dlp and publish them as podcast feeds")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// JSON object whose top-level keys override the configuration file
    #[arg(short, long = "json-config", default_value = "{}")]
    json_config: String,

    /// Only process these subscriptions (comma-separated names)
    #[arg(short, long)]
    filter: Option<String>,

    /// Never process these subscriptions (comma-separated names)
    #[arg(short, long)]
    exclude: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { multi, main_bar }
    }

    /// Print a line above the spinner
    fn line(&self, message: String) {
        if self.multi.println(&message).is_err() {
            println!("{message}");
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::SubscriptionStarted { name } => {
                self.line(format!("\n{HEADPHONES}{}", name.bold().green()));
            }

            ProgressEvent::SubscriptionSkipped { name, reason } => {
                self.line(format!("{SKIP}{} {}", name.yellow(), reason.dimmed()));
            }

            ProgressEvent::EnumeratingSource { url, .. } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Listing {}", url.cyan()));
            }

            ProgressEvent::EnumerationFailed { name, error } => {
                self.line(format!(
                    "  {FAILURE}{} could not be listed: {}",
                    name.red(),
                    error.red()
                ));
            }

            ProgressEvent::SourceEnumerated {
                total_entries,
                to_consider,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} entries listed, {} to check",
                    total_entries.to_string().cyan(),
                    to_consider.to_string().yellow()
                ));
            }

            ProgressEvent::DownloadingPlaylist { url, .. } => {
                self.main_bar
                    .set_message(format!("{DOWNLOAD}Downloading playlist {}", url.cyan()));
            }

            ProgressEvent::EntryFilteredOut { url } => {
                self.main_bar
                    .set_message(format!("{SKIP}Out of range: {}", url.dimmed()));
            }

            ProgressEvent::EntryAlreadyArchived { label } => {
                self.main_bar.set_message(format!(
                    "{SKIP}Already archived: {}",
                    truncate_title(&label, 50).dimmed()
                ));
            }

            ProgressEvent::EntryLiveSkipped { label } => {
                self.line(format!(
                    "  {SKIP}{} is live, retrying next run",
                    truncate_title(&label, 50).yellow()
                ));
            }

            ProgressEvent::DownloadStarting {
                label,
                entry_index,
                total_entries,
            } => {
                self.main_bar.set_message(format!(
                    "{DOWNLOAD}[{}/{}] {}",
                    (entry_index + 1).to_string().cyan(),
                    total_entries.to_string().cyan(),
                    truncate_title(&label, 50)
                ));
            }

            ProgressEvent::DownloadCompleted { label } => {
                self.line(format!("  {SUCCESS}{}", truncate_title(&label, 60).green()));
            }

            ProgressEvent::DownloadFailed { label, error } => {
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&label, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::IconFetched { path } => {
                self.line(format!(
                    "  {SUCCESS}Icon stored at {}",
                    path.display().to_string().cyan()
                ));
            }

            ProgressEvent::IconUnavailable { reason } => {
                self.main_bar
                    .set_message(format!("No channel icon: {}", reason.dimmed()));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.line(format!(
                    "  {BROOM}Removed {} stale partial file(s)",
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::FilesPurged { paths, .. } => {
                self.line(format!(
                    "  {BROOM}Purged {} file(s) past retention",
                    paths.len().to_string().yellow()
                ));
            }

            ProgressEvent::ThumbnailConverted { path } => {
                self.main_bar.set_message(format!(
                    "Converted thumbnail {}",
                    path.display().to_string().dimmed()
                ));
            }

            ProgressEvent::ThumbnailConversionFailed { path, error } => {
                self.line(format!(
                    "  {FAILURE}Thumbnail {} kept as is: {}",
                    path.display().to_string().yellow(),
                    error.dimmed()
                ));
            }

            ProgressEvent::MetadataParseFailed { path, error } => {
                self.line(format!(
                    "  {FAILURE}Skipping {}: {}",
                    path.display().to_string().yellow(),
                    error.red()
                ));
            }

            ProgressEvent::NfoWritten { path } => {
                self.main_bar
                    .set_message(format!("Wrote {}", path.display().to_string().dimmed()));
            }

            ProgressEvent::StylesheetWritten { path } => {
                self.main_bar
                    .set_message(format!("Wrote {}", path.display().to_string().dimmed()));
            }

            ProgressEvent::FeedWritten {
                path,
                episode_count,
                ..
            } => {
                self.line(format!(
                    "  {SUCCESS}Feed {} with {} episode(s)",
                    path.display().to_string().cyan(),
                    episode_count.to_string().green()
                ));
            }

            ProgressEvent::SubscriptionFailed { name, error } => {
                self.line(format!("  {FAILURE}{} - {}", name.red().bold(), error.red()));
            }

            ProgressEvent::SyncCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
                ..
            } => {
                self.line(format!(
                    "  {} {} downloaded, {} skipped, {} failed",
                    "Sync complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                ));
            }

            ProgressEvent::IndexWritten {
                path,
                subscription_count,
            } => {
                self.line(format!(
                    "\n{FOLDER}Index of {} feed(s): {}",
                    subscription_count.to_string().green(),
                    path.display().to_string().cyan()
                ));
            }

            ProgressEvent::IndexFailed { path, error } => {
                self.line(format!(
                    "\n{FAILURE}Index in {} not written: {}",
                    path.display().to_string().yellow(),
                    error.red()
                ));
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config, &args.json_config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;

    if !args.quiet {
        println!(
            "\n{}{} {}",
            MICROPHONE,
            "ydlpod".bold().magenta(),
            "- Channel Archiver".dimmed()
        );
    }

    let extractor = CommandExtractor::from_selector(config.engine.as_deref());
    let client = ReqwestClient::new();
    let converter = config
        .ffmpeg_path
        .as_deref()
        .map(FfmpegConverter::new)
        .unwrap_or_default();

    let indicatif = (!args.quiet).then(|| Arc::new(IndicatifReporter::new()));
    let reporter: SharedProgressReporter = match &indicatif {
        Some(reporter) => reporter.clone(),
        None => NoopReporter::shared(),
    };

    let selection = Selection::from_lists(args.filter.as_deref(), args.exclude.as_deref());
    let services = Services {
        extractor: &extractor,
        client: &client,
        converter: &converter,
    };

    let summary = run(&config, &selection, &services, Local::now(), &reporter).await;

    if let Some(indicatif) = indicatif {
        indicatif.main_bar.finish_and_clear();
    }

    if args.quiet {
        return Ok(());
    }

    let downloaded: usize = summary
        .processed
        .iter()
        .filter_map(|outcome| outcome.sync.as_ref())
        .map(|sync| sync.downloaded.len())
        .sum();

    println!(
        "\n{PARTY}{} {} subscription(s) processed, {} new episode(s)",
        "Done:".bold().green(),
        summary.processed.len().to_string().green().bold(),
        downloaded.to_string().green()
    );

    if !summary.failed.is_empty() {
        println!("\n{}", "Failed subscriptions:".red().bold());
        for (name, error) in &summary.failed {
            println!("  {}{} - {}", CROSS, name.yellow(), error.dimmed());
        }
    }

    Ok(())
}
