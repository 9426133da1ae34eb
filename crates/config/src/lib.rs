//! Settings for the clove actor runtime.
//!
//! A [`Settings`] value is constructed once, before the actor system starts,
//! and passed down explicitly. Actor-level values are resolved per path:
//!
//! - **Defaults**: the `[actor]` table, or [`ActorSettings::default`]
//! - **Path overrides**: `[actors."/usr/pool"]` tables, applied from `/` down
//!   to the exact actor path, most specific last
//!
//! ```toml
//! termination-timeout-ms = 10000
//!
//! [actor]
//! queue-capacity = 1000
//! stop-timeout-ms = 5000
//!
//! [actors."/usr/ticker"]
//! queue-capacity = 4
//! ```

pub mod error;
mod settings;

pub use error::{ConfigError, Result};
pub use settings::{ActorOverrides, ActorSettings, HookErrorPolicy, Settings};
