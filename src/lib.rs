pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod http;
pub mod icon;
pub mod metadata;
pub mod progress;
pub mod retention;
pub mod run;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::{Config, RawSubscription, Subscription, load_config, resolve};
pub use error::{
    ConfigError, ConvertError, DownloadError, ExtractError, IconError, MetadataError, RenderError,
    StateError, SubscriptionError, SyncError,
};
pub use extract::{CommandExtractor, Engine, Extractor};
pub use feed::{FeedOptions, render_feed, render_index, write_feed, write_index};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use metadata::{EpisodeRecord, FfmpegConverter, ThumbnailConverter, collect_records};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use run::{RunSummary, Selection, Services, SubscriptionOutcome, run};
pub use sync::{ArchivedEntry, SyncResult, sync_subscription};
