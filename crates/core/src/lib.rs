//! pic2acg core: the platform-independent half of the mobile app.
//!
//! Front ends hand in `(method, params)` pairs through a [`Dispatcher`];
//! [`AppCore`] answers them against the property store and the data root,
//! and long-running work reports back through the [`EventNotifier`].
//! Nothing here depends on a particular platform.

pub mod account;
pub mod app;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod gate;
pub mod notifier;
pub mod origin;
pub mod paths;
pub mod properties;
pub mod storage;

pub use app::AppCore;
pub use command::{Command, Reply};
pub use config::Config;
pub use dispatch::{CommandHandler, Dispatcher, HandlerChain};
pub use notifier::{CoreEvent, EventNotifier};
pub use origin::OriginContext;
