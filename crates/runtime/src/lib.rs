//! In-process actor runtime.
//!
//! Actors form a supervised tree rooted at `/`. Each one owns a bounded FIFO
//! mailbox drained by a single message loop, so its behavior never runs
//! concurrently with itself in the default [`DispatchMode::Sync`] mode.
//! Actors are addressed by [`ActorRef`] or by path and talk only through
//! messages:
//!
//! - [`ActorRef::send`] enqueues and waits while the mailbox is full;
//! - [`ActorRef::ask`] adds a one-shot reply bounded by a timeout;
//! - [`ActorRef::request`] defers cancellation to a caller-held [`Scope`].
//!
//! Stopping an actor stops its subtree first, children in creation order,
//! each fully stopped before the next.
//!
//! ```ignore
//! let system = System::new("app")?;
//! let echo = system.spawn(Definition::new("echo", Behavior::from_fn(|text: String| async move { text })))?;
//! let reply: String = echo.ask("hi".to_string(), Duration::from_secs(1)).await?;
//! system.terminate().await?;
//! ```

mod class;
mod context;
mod control;
mod definition;
mod dispatch;
mod error;
mod logger;
mod mailbox;
mod message;
mod path;
mod pool;
mod pubsub;
mod reference;
mod runnable;
mod spawn;
mod system;
mod timer;
mod token;

pub use clove_config::{ActorOverrides, ActorSettings, HookErrorPolicy, Settings};

pub use crate::context::Context;
pub use crate::control::Stop;
pub use crate::definition::{Definition, DispatchMode, HookKind, HookOutput, IntoHook, Lifecycle};
pub use crate::dispatch::{
	Behavior, BoxFuture, Callback, Capabilities, ContextOnly, Handler, IntoReply, Method, NoArgs, PayloadOnly, Returns, Shape, Value, WithContext,
};
pub use crate::error::{ActorError, Result};
pub use crate::logger::{LogLevel, LogRecord};
pub use crate::message::{Message, Payload, Reply, ReplySlot};
pub use crate::pool::pool;
pub use crate::pubsub::{Broadcast, Filter, Publish, Subscribe, SubscriptionCount, Unsubscribe};
pub use crate::reference::{ActorRef, PendingReply};
pub use crate::system::{CORE_PATH, LOGGER_PATH, PUBSUB_PATH, SRV_PATH, Service, System, USR_PATH};
pub use crate::timer::{Ticker, Timer};
pub use crate::token::Scope;
