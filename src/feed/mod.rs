mod index;
mod render;

pub use index::{INDEX_FILENAME, listed_names, render_index, write_index};
pub use render::{FeedOptions, STYLESHEET_FILENAME, render_feed, write_feed, write_stylesheet};
