//! The logger actor living at `/core/logger`.
//!
//! Actors log through their [`Context`](crate::Context); records travel over
//! pub/sub like any other broadcast and end up as `tracing` events here.

use crate::context::Context;
use crate::definition::Definition;
use crate::dispatch::Behavior;
use crate::pubsub::Filter;

pub(crate) const NAME: &str = "logger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
	Debug,
	Info,
	Warn,
	Error,
}

/// One log line published by an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
	pub level: LogLevel,
	/// Path of the actor that logged.
	pub path: String,
	pub message: String,
}

pub(crate) fn emit(record: &LogRecord) {
	let LogRecord { level, path, message } = record;
	match level {
		LogLevel::Debug => tracing::debug!(actor = %path, "{message}"),
		LogLevel::Info => tracing::info!(actor = %path, "{message}"),
		LogLevel::Warn => tracing::warn!(actor = %path, "{message}"),
		LogLevel::Error => tracing::error!(actor = %path, "{message}"),
	}
}

async fn on_record(record: LogRecord) {
	emit(&record);
}

pub(crate) fn definition() -> Definition {
	Definition::new(NAME, Behavior::from_fn(on_record)).post_start(|ctx: Context| async move { ctx.subscribe(Filter::of::<LogRecord>()).await })
}
