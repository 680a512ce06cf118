// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod load;
mod subscription;

pub use load::{Config, RawSubscription, load_config};
pub use subscription::{DEFAULT_FILENAME_TEMPLATE, ICON_FILENAME, Subscription, resolve};
