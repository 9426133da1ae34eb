//! The actor system: root actor, its fixed children and system-wide services.
//!
//! ```text
//! /            root
//! ├── usr      user actors spawned through System::spawn
//! ├── srv      services spawned through System::spawn_service
//! └── core
//!     ├── pubsub
//!     └── logger
//! ```
//!
//! The root stops its children in creation order, so `core` goes last and
//! user actors can still publish and log while they shut down.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use clove_config::Settings;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::class::TaskKind;
use crate::context::Context;
use crate::definition::Definition;
use crate::dispatch::Behavior;
use crate::error::{ActorError, Result};
use crate::message::{Message, Reply};
use crate::pubsub::{Filter, Publish, Subscribe, Unsubscribe};
use crate::reference::ActorRef;
use crate::runnable::Runnable;
use crate::spawn::spawn;
use crate::timer::{Ticker, Timer};
use crate::{logger, path, pubsub};

pub const USR_PATH: &str = "/usr";
pub const SRV_PATH: &str = "/srv";
pub const CORE_PATH: &str = "/core";
pub const PUBSUB_PATH: &str = "/core/pubsub";
pub const LOGGER_PATH: &str = "/core/logger";

/// State shared by every actor of one system.
pub(crate) struct SystemCore {
	name: String,
	settings: Settings,
	root: OnceLock<Weak<Runnable>>,
	terminated: watch::Sender<bool>,
}

impl SystemCore {
	pub(crate) fn settings(&self) -> &Settings {
		&self.settings
	}

	pub(crate) fn root(&self) -> Option<Arc<Runnable>> {
		self.root.get().and_then(Weak::upgrade)
	}

	pub(crate) fn mark_terminated(&self) {
		if !self.terminated.send_replace(true) {
			tracing::info!(system = %self.name, "system.terminated");
		}
	}
}

/// Something registered under `/srv`.
pub trait Service: Send + Sync + 'static {
	fn definition(&self) -> Definition;
}

/// Handle to a running actor system. Cheap to clone.
#[derive(Clone)]
pub struct System {
	core: Arc<SystemCore>,
}

impl System {
	/// Starts a system with default settings.
	pub fn new(name: impl Into<String>) -> Result<Self> {
		Self::with_settings(name, Settings::default())
	}

	pub fn with_settings(name: impl Into<String>, settings: Settings) -> Result<Self> {
		let name = name.into();
		if name.is_empty() {
			return Err(ActorError::Validation("system name must not be empty".to_string()));
		}

		let (terminated, _) = watch::channel(false);
		let core = Arc::new(SystemCore {
			name,
			settings,
			root: OnceLock::new(),
			terminated,
		});

		let root = Runnable::create(None, &core, guard(""))?;
		let _ = core.root.set(Arc::downgrade(&root));

		Runnable::create(Some(&root), &core, guard("usr"))?;
		Runnable::create(Some(&root), &core, guard("srv"))?;
		let system_core = Runnable::create(Some(&root), &core, guard("core"))?;
		Runnable::create(Some(&system_core), &core, pubsub::definition())?;
		Runnable::create(Some(&system_core), &core, logger::definition())?;

		tracing::info!(system = %core.name, "system.start");
		Ok(Self { core })
	}

	pub(crate) fn from_core(core: Arc<SystemCore>) -> Self {
		Self { core }
	}

	pub fn name(&self) -> &str {
		&self.core.name
	}

	pub fn settings(&self) -> &Settings {
		&self.core.settings
	}

	pub fn root(&self) -> Result<ActorRef> {
		self.root_actor().map(|root| root.actor_ref())
	}

	/// Resolves an absolute or root-relative path.
	pub fn at(&self, path: &str) -> Result<ActorRef> {
		self.resolve(path).map(|found| found.actor_ref())
	}

	/// Creates a user actor under `/usr`.
	pub fn spawn(&self, definition: Definition) -> Result<ActorRef> {
		self.spawn_under(USR_PATH, definition)
	}

	/// Creates a service under `/srv`.
	pub fn spawn_service(&self, service: &impl Service) -> Result<ActorRef> {
		self.spawn_under(SRV_PATH, service.definition())
	}

	/// Broadcasts `value` to every subscriber whose filter accepts it.
	///
	/// Returns once the broadcast is queued at the pub/sub actor.
	pub async fn publish<T: Clone + Send + Sync + 'static>(&self, value: T) -> Result<()> {
		self.at(PUBSUB_PATH)?.send(Publish::new(value)).await
	}

	/// Registers `subscriber`, replacing any filter it subscribed with before.
	pub async fn subscribe(&self, subscriber: &ActorRef, filter: Filter) -> Result<()> {
		let request = Subscribe {
			subscriber: subscriber.clone(),
			filter,
		};
		self.ask_pubsub(request).await
	}

	pub async fn unsubscribe(&self, subscriber: &ActorRef) -> Result<()> {
		let request = Unsubscribe {
			subscriber: subscriber.clone(),
		};
		self.ask_pubsub(request).await
	}

	/// Stops the whole tree within the configured termination timeout.
	pub async fn terminate(&self) -> Result<()> {
		self.terminate_with_timeout(self.core.settings.termination_timeout()).await
	}

	pub async fn terminate_with_timeout(&self, timeout: Duration) -> Result<()> {
		let Some(root) = self.core.root() else {
			return Ok(());
		};
		tracing::info!(system = %self.core.name, ?timeout, "system.terminate");
		root.actor_ref().stop(timeout).await
	}

	/// Resolves once the root actor has stopped.
	pub async fn terminated(&self) {
		let mut rx = self.core.terminated.subscribe();
		let _ = rx.wait_for(|done| *done).await;
	}

	pub fn is_terminated(&self) -> bool {
		*self.core.terminated.borrow()
	}

	/// Terminates the system when the process receives Ctrl-C.
	pub fn shutdown_on_ctrl_c(&self) -> JoinHandle<()> {
		let system = self.clone();
		spawn(TaskKind::Signal, async move {
			if let Err(err) = tokio::signal::ctrl_c().await {
				tracing::warn!(system = %system.name(), error = %err, "system.signal.unavailable");
				return;
			}
			tracing::info!(system = %system.name(), "system.signal.ctrl_c");
			if let Err(err) = system.terminate().await {
				tracing::warn!(system = %system.name(), error = %err, "system.terminate.failed");
			}
		})
	}

	/// Runs `fire` once after `delay`.
	pub fn timer<F, Fut>(&self, delay: Duration, fire: F) -> Timer
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		Timer::start(delay, fire)
	}

	/// Runs `tick` every `period` until the ticker is stopped or dropped.
	pub fn ticker<F, Fut>(&self, period: Duration, tick: F) -> Ticker
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		Ticker::start(period, tick)
	}

	fn root_actor(&self) -> Result<Arc<Runnable>> {
		self.core.root().filter(|root| !root.is_stopped()).ok_or(ActorError::Terminated)
	}

	fn resolve(&self, target: &str) -> Result<Arc<Runnable>> {
		let root = self.root_actor()?;
		path::resolve(&root, target).ok_or_else(|| ActorError::NotFound(target.to_string()))
	}

	fn spawn_under(&self, parent: &str, definition: Definition) -> Result<ActorRef> {
		let parent = self.resolve(parent)?;
		Runnable::create(Some(&parent), &self.core, definition).map(|actor| actor.actor_ref())
	}

	async fn ask_pubsub<T: Send + 'static>(&self, request: T) -> Result<()> {
		let pubsub = self.resolve(PUBSUB_PATH)?;
		let timeout = pubsub.settings().subscription_timeout;
		match pubsub.actor_ref().ask_reply(request, timeout).await? {
			Reply::Done => Ok(()),
			Reply::Error(err) => Err(err),
			other => Err(ActorError::UnexpectedReply {
				expected: "done",
				found: other.kind(),
			}),
		}
	}
}

impl std::fmt::Debug for System {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("System")
			.field("name", &self.core.name)
			.field("terminated", &self.is_terminated())
			.finish()
	}
}

/// Structural actors only supervise; direct messages are refused.
fn guard(name: &str) -> Definition {
	Definition::new(name, Behavior::new().on_message(refuse))
}

async fn refuse(ctx: Context, mut message: Message) {
	let reason = format!("{} does not accept {}", ctx.path(), message.payload().type_name());
	message.reply(Reply::Error(ActorError::Unsupported(reason)));
}
