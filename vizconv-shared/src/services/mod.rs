// SPDX-License-Identifier: GPL-3.0-only
pub mod notification;

pub use notification::{ChangeHandler, ChangeNotifier, ConfigurationChanged, SubscriptionError};
