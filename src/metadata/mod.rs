mod nfo;
mod sidecar;
pub(crate) mod thumbnail;

pub use nfo::{SHOW_NFO_FILENAME, write_nfo_files};
pub use sidecar::{EpisodeRecord, collect_records, format_duration, parse_sidecar};
pub use thumbnail::{FfmpegConverter, ThumbnailConverter};
