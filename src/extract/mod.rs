// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod engine;
mod entry;
mod options;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::{CommandExtractor, Engine, Extractor};
pub use entry::{EntryInfo, Listing, MARKER_EXTENSION, RemoteEntry, enumerate, probe_entry};
pub use options::{AudioExtraction, ExtractOptions};
