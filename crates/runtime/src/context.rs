use std::sync::Arc;
use std::time::Duration;

use clove_config::ActorSettings;
use tokio_util::sync::CancellationToken;

use crate::class::TaskKind;
use crate::control::Stop;
use crate::definition::Definition;
use crate::error::{ActorError, Result};
use crate::logger::{LogLevel, LogRecord, emit};
use crate::path;
use crate::pubsub::{Filter, Publish};
use crate::reference::ActorRef;
use crate::runnable::Runnable;
use crate::spawn::spawn;
use crate::system::{PUBSUB_PATH, System};
use crate::timer::Ticker;
use crate::token::Scope;

/// Per-invocation handle given to handlers and lifecycle hooks.
///
/// Carries the actor it runs for and a [`Scope`] derived from the request
/// (or from the hook timeout), so long-running work can watch for
/// cancellation.
#[derive(Clone)]
pub struct Context {
	actor: Arc<Runnable>,
	scope: Scope,
}

impl Context {
	pub(crate) fn new(actor: Arc<Runnable>, scope: Scope) -> Self {
		Self { actor, scope }
	}

	pub fn system(&self) -> System {
		System::from_core(Arc::clone(self.actor.core()))
	}

	pub fn self_ref(&self) -> ActorRef {
		self.actor.actor_ref()
	}

	pub fn name(&self) -> &str {
		self.actor.name()
	}

	pub fn path(&self) -> &str {
		self.actor.path()
	}

	/// Settings resolved for this actor's path.
	pub fn settings(&self) -> &ActorSettings {
		self.actor.settings()
	}

	pub fn parent(&self) -> Option<ActorRef> {
		self.actor.parent().map(|parent| parent.actor_ref())
	}

	/// Live children, in creation order.
	pub fn children(&self) -> Vec<ActorRef> {
		self.actor.children().iter().map(|child| child.actor_ref()).collect()
	}

	pub fn child(&self, name: &str) -> Option<ActorRef> {
		self.actor.live_child(name).map(|child| child.actor_ref())
	}

	/// Resolves `path` relative to this actor.
	pub fn at(&self, path: &str) -> Result<ActorRef> {
		path::resolve(&self.actor, path)
			.map(|found| found.actor_ref())
			.ok_or_else(|| ActorError::NotFound(path.to_string()))
	}

	/// Creates a child of this actor.
	pub fn spawn(&self, definition: Definition) -> Result<ActorRef> {
		Runnable::create(Some(&self.actor), self.actor.core(), definition).map(|child| child.actor_ref())
	}

	/// Broadcasts `value` to every matching subscriber.
	pub async fn publish<T: Clone + Send + Sync + 'static>(&self, value: T) -> Result<()> {
		self.system().publish(value).await
	}

	/// Subscribes this actor to published values accepted by `filter`.
	pub async fn subscribe(&self, filter: Filter) -> Result<()> {
		self.system().subscribe(&self.self_ref(), filter).await
	}

	pub async fn unsubscribe(&self) -> Result<()> {
		self.system().unsubscribe(&self.self_ref()).await
	}

	/// Asks this actor to stop once the messages ahead of the request are done.
	///
	/// Never waits, so it is safe to call from the actor's own handlers.
	pub fn stop(&self) {
		let me = self.self_ref();
		spawn(TaskKind::Notify, async move {
			if let Err(err) = me.send(Stop).await {
				tracing::trace!(actor = %me.path(), error = %err, "actor.stop.undelivered");
			}
		});
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	pub fn is_cancelled(&self) -> bool {
		self.scope.is_cancelled()
	}

	pub async fn cancelled(&self) {
		self.scope.cancelled().await;
	}

	/// Sends a clone of `payload` to this actor every `period`.
	///
	/// The ticker ends on its own once the actor stops.
	pub fn tick_self<T: Clone + Send + Sync + 'static>(&self, period: Duration, payload: T) -> Ticker {
		let target = self.self_ref();
		let cancel = CancellationToken::new();
		let finished = cancel.clone();
		Ticker::start_with(cancel, period, move || {
			let target = target.clone();
			let payload = payload.clone();
			let finished = finished.clone();
			async move {
				if target.send(payload).await.is_err() {
					finished.cancel();
				}
			}
		})
	}

	pub fn debug(&self, message: impl Into<String>) {
		self.log(LogLevel::Debug, message.into());
	}

	pub fn info(&self, message: impl Into<String>) {
		self.log(LogLevel::Info, message.into());
	}

	pub fn warn(&self, message: impl Into<String>) {
		self.log(LogLevel::Warn, message.into());
	}

	pub fn error(&self, message: impl Into<String>) {
		self.log(LogLevel::Error, message.into());
	}

	/// Publishes a record for the logger actor, or emits it directly when the
	/// pub/sub actor is gone or saturated.
	fn log(&self, level: LogLevel, message: String) {
		let record = LogRecord {
			level,
			path: self.path().to_string(),
			message,
		};
		let published = self
			.system()
			.at(PUBSUB_PATH)
			.and_then(|pubsub| pubsub.try_send(Publish::new(record.clone())));
		if published.is_err() {
			emit(&record);
		}
	}
}

impl std::fmt::Debug for Context {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Context")
			.field("actor", &self.actor.path())
			.field("scope", &self.scope)
			.finish()
	}
}
