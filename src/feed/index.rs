// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::RawSubscription;
use crate::error::StateError;
use crate::state::{ensure_dir, write_atomic};

/// File name of the listing page in the output directory
pub const INDEX_FILENAME: &str = "index.html";

const INDEX_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Podcast feeds</title>
    <style>
body {
    font-family: system-ui, sans-serif;
    background: #f5f5f5;
    margin: 0;
    padding: 24px;
}

ul {
    display: flex;
    flex-direction: column;
    gap: 8px;
    padding: 0;
}

li {
    list-style: none;
}
    </style>
  </head>
  <body>
    <h1>Podcast feeds</h1>
    <ul>
"#;

const INDEX_TAIL: &str = "    </ul>\n  </body>\n</html>\n";

/// Render the listing page linking every non-private subscription's feed
///
/// Subscriptions without a name are left out.
pub fn render_index(subscriptions: &[RawSubscription]) -> String {
    let mut html = String::from(INDEX_HEAD);

    for name in listed_names(subscriptions) {
        let href = format!("{name}.xml");
        html.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            encode_double_quoted_attribute(&href),
            encode_text(name)
        ));
    }

    html.push_str(INDEX_TAIL);
    html
}

/// Write `index.html` into `output_dir`
pub fn write_index(
    output_dir: &Path,
    subscriptions: &[RawSubscription],
) -> Result<PathBuf, StateError> {
    let path = output_dir.join(INDEX_FILENAME);
    ensure_dir(output_dir)?;
    write_atomic(&path, render_index(subscriptions).as_bytes())?;
    Ok(path)
}

/// Names of the subscriptions shown on the index page
pub fn listed_names(subscriptions: &[RawSubscription]) -> impl Iterator<Item = &str> {
    subscriptions
        .iter()
        .filter(|sub| !sub.private.unwrap_or(false))
        .filter_map(|sub| sub.name.as_deref())
}
