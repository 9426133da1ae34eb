//! Live actor instances and their message loop.

mod hooks;
mod stop;

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use clove_config::{ActorSettings, HookErrorPolicy};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::class::TaskKind;
use crate::context::Context;
use crate::control::{ChildStopped, IdleTimeout, Stop};
use crate::definition::{Definition, DispatchMode, HookKind};
use crate::dispatch::Resolution;
use crate::error::{ActorError, Result};
use crate::mailbox::{MailboxReceiver, MailboxSender, mailbox};
use crate::message::{Message, Payload, Reply};
use crate::reference::ActorRef;
use crate::spawn::{join_error_panic_message, spawn};
use crate::system::SystemCore;
use crate::timer::Timer;

/// Lifecycle states of one actor instance.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
	Created = 0,
	Starting = 1,
	Running = 2,
	StoppingSelf = 3,
	StoppingChildren = 4,
	Stopped = 5,
}

impl Lifecycle {
	const fn from_u8(raw: u8) -> Self {
		match raw {
			0 => Self::Created,
			1 => Self::Starting,
			2 => Self::Running,
			3 => Self::StoppingSelf,
			4 => Self::StoppingChildren,
			_ => Self::Stopped,
		}
	}

	pub(crate) const fn is_stopping(self) -> bool {
		matches!(self, Self::StoppingSelf | Self::StoppingChildren | Self::Stopped)
	}
}

/// One live actor: mailbox, tree links, settings and the running loop.
pub(crate) struct Runnable {
	name: String,
	path: String,
	definition: Definition,
	settings: ActorSettings,
	core: Arc<SystemCore>,
	/// Lookup and upward notification only; never keeps the parent alive.
	parent: Mutex<Option<Weak<Runnable>>>,
	children: Mutex<Vec<Arc<Runnable>>>,
	mailbox: MailboxSender<Message>,
	state: AtomicU8,
	idle: Mutex<Option<Timer>>,
	/// Bumped on every refresh so an `IdleTimeout` queued earlier is ignored.
	idle_generation: Arc<AtomicU64>,
	dispatch_limit: Arc<Semaphore>,
	dispatch_permits: u32,
}

impl Runnable {
	/// Validates `definition`, registers the new actor under `parent` and
	/// starts it. Hooks and the loop run concurrently with the caller.
	pub(crate) fn create(parent: Option<&Arc<Runnable>>, core: &Arc<SystemCore>, definition: Definition) -> Result<Arc<Runnable>> {
		definition.validate()?;

		// The root is named after its path so no path segment can alias it.
		let name = match (parent, definition.name()) {
			(None, _) => "/".to_string(),
			(Some(_), "") => generated_name(),
			(Some(_), name) => name.to_string(),
		};
		let path = match parent {
			Some(parent) => child_path(&parent.path, &name),
			None => "/".to_string(),
		};
		let settings = core.settings().actor(&path);
		let capacity = definition.capacity().unwrap_or(settings.queue_capacity);
		let permits = settings.dispatch_limit(capacity).min(Semaphore::MAX_PERMITS);
		let dispatch_permits = u32::try_from(permits).unwrap_or(u32::MAX);
		let (tx, rx) = mailbox(capacity);

		let actor = Arc::new(Runnable {
			name,
			path,
			definition,
			settings,
			core: Arc::clone(core),
			parent: Mutex::new(parent.map(Arc::downgrade)),
			children: Mutex::new(Vec::new()),
			mailbox: tx,
			state: AtomicU8::new(Lifecycle::Created as u8),
			idle: Mutex::new(None),
			idle_generation: Arc::default(),
			dispatch_limit: Arc::new(Semaphore::new(dispatch_permits as usize)),
			dispatch_permits,
		});

		if let Some(parent) = parent {
			parent.adopt(&actor)?;
		}

		actor.set_state(Lifecycle::Starting);
		tracing::debug!(
			actor = %actor.path,
			capacity,
			mode = ?actor.definition.mode(),
			"actor.create"
		);
		spawn(TaskKind::MessageLoop, Arc::clone(&actor).run(rx));
		Ok(actor)
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn path(&self) -> &str {
		&self.path
	}

	pub(crate) fn settings(&self) -> &ActorSettings {
		&self.settings
	}

	pub(crate) fn core(&self) -> &Arc<SystemCore> {
		&self.core
	}

	pub(crate) fn actor_ref(&self) -> ActorRef {
		ActorRef::new(&self.name, &self.path, self.mailbox.clone())
	}

	pub(crate) fn state(&self) -> Lifecycle {
		Lifecycle::from_u8(self.state.load(Ordering::Acquire))
	}

	fn set_state(&self, state: Lifecycle) {
		self.state.store(state as u8, Ordering::Release);
	}

	pub(crate) fn is_stopped(&self) -> bool {
		self.state() == Lifecycle::Stopped
	}

	pub(crate) fn parent(&self) -> Option<Arc<Runnable>> {
		self.parent.lock().as_ref().and_then(Weak::upgrade)
	}

	/// Root of the tree this actor belongs to.
	pub(crate) fn root(self: &Arc<Self>) -> Arc<Runnable> {
		if let Some(root) = self.core.root() {
			return root;
		}
		let mut node = Arc::clone(self);
		while let Some(parent) = node.parent() {
			node = parent;
		}
		node
	}

	/// Live children, in creation order.
	pub(crate) fn children(&self) -> Vec<Arc<Runnable>> {
		self.children.lock().iter().filter(|child| !child.is_stopped()).cloned().collect()
	}

	pub(crate) fn live_child(&self, name: &str) -> Option<Arc<Runnable>> {
		self.children.lock().iter().find(|child| child.name == name && !child.is_stopped()).cloned()
	}

	fn adopt(&self, child: &Arc<Runnable>) -> Result<()> {
		let mut children = self.children.lock();
		if self.state().is_stopping() {
			return Err(ActorError::Closed);
		}
		children.retain(|existing| !existing.is_stopped());
		if children.iter().any(|existing| existing.name == child.name) {
			return Err(ActorError::DuplicateChild {
				parent: self.path.clone(),
				name: child.name.clone(),
			});
		}
		children.push(Arc::clone(child));
		Ok(())
	}

	fn remove_child(&self, path: &str) {
		self.children.lock().retain(|child| child.path != path);
	}

	async fn run(self: Arc<Self>, mut rx: MailboxReceiver<Message>) {
		if let Err(err) = self.run_hook(HookKind::PreStart).await {
			self.report_hook_failure(&err);
			if self.settings.hook_errors == HookErrorPolicy::FailFast {
				tracing::warn!(actor = %self.path, error = %err, "actor.start.aborted");
				self.abort(&mut rx);
				return;
			}
		}

		self.arm_idle_timer();
		let actor = Arc::clone(&self);
		spawn(TaskKind::Hook, async move {
			match actor.run_hook(HookKind::PostStart).await {
				Ok(()) => actor.mark_running(),
				Err(err) => {
					actor.report_hook_failure(&err);
					if actor.settings.hook_errors == HookErrorPolicy::FailFast {
						Context::new(Arc::clone(&actor), Default::default()).stop();
					} else {
						actor.mark_running();
					}
				}
			}
		});

		self.message_loop(rx).await;
	}

	fn mark_running(&self) {
		let _ = self
			.state
			.compare_exchange(Lifecycle::Starting as u8, Lifecycle::Running as u8, Ordering::AcqRel, Ordering::Acquire);
		tracing::debug!(actor = %self.path, "actor.running");
	}

	async fn message_loop(self: &Arc<Self>, mut rx: MailboxReceiver<Message>) {
		while let Some(mut message) = rx.recv().await {
			if message.payload().is::<Stop>() {
				self.stop(message, &mut rx).await;
				return;
			}
			if let Some(idle) = message.payload().downcast_ref::<IdleTimeout>() {
				if idle.generation != self.idle_generation.load(Ordering::Acquire) {
					tracing::trace!(actor = %self.path, "actor.idle_timeout.stale");
					continue;
				}
				tracing::debug!(actor = %self.path, "actor.idle_timeout");
				self.stop(message, &mut rx).await;
				return;
			}
			if let Some(stopped) = message.payload().downcast_ref::<ChildStopped>() {
				let path = stopped.path.clone();
				tracing::trace!(actor = %self.path, child = %path, "actor.child_stopped");
				self.remove_child(&path);
				message.reply(Reply::Done);
				continue;
			}
			if message.scope().is_cancelled() {
				tracing::trace!(
					actor = %self.path,
					payload = message.payload().type_name(),
					"actor.message.cancelled"
				);
				continue;
			}

			if self.definition.refreshes_on_message() {
				self.refresh_idle_timer();
			}

			match self.definition.mode() {
				DispatchMode::Sync => self.dispatch(message).await,
				DispatchMode::Async => {
					let Ok(permit) = Arc::clone(&self.dispatch_limit).acquire_owned().await else {
						break;
					};
					let actor = Arc::clone(self);
					spawn(TaskKind::Dispatch, async move {
						actor.dispatch(message).await;
						drop(permit);
					});
				}
			}
		}
	}

	/// Runs the behavior for one message on its own task so a panic only
	/// fails that message.
	async fn dispatch(self: &Arc<Self>, message: Message) {
		let type_name = message.payload().type_name();
		let ctx = Context::new(Arc::clone(self), message.scope().child());

		match self.definition.behavior().resolve(message.payload().type_id()) {
			Resolution::Handler(call) => {
				let (payload, mut reply, _scope) = message.into_parts();
				let reply_value = match spawn(TaskKind::Dispatch, call(ctx, payload)).await {
					Ok(reply) => reply,
					Err(err) => Reply::Error(self.dispatch_failure(type_name, err)),
				};
				reply.send(reply_value);
			}
			Resolution::Message(call) => {
				if let Err(err) = spawn(TaskKind::Dispatch, call(ctx, message)).await {
					self.dispatch_failure(type_name, err);
				}
			}
			Resolution::Unhandled => {
				tracing::trace!(actor = %self.path, payload = type_name, "actor.dispatch.unhandled");
				let (_, mut reply, _) = message.into_parts();
				reply.send(Reply::Error(ActorError::NoHandler(type_name)));
			}
		}
	}

	fn dispatch_failure(&self, type_name: &'static str, err: tokio::task::JoinError) -> ActorError {
		let reason = join_error_panic_message(err).unwrap_or_else(|| "dispatch task cancelled".to_string());
		tracing::error!(actor = %self.path, payload = type_name, panic = %reason, "actor.dispatch.panic");
		ActorError::Panicked(reason)
	}

	fn arm_idle_timer(&self) {
		let Some(timeout) = self.definition.idle() else {
			return;
		};
		let mailbox = self.mailbox.clone();
		let generation = Arc::clone(&self.idle_generation);
		let timer = Timer::start(timeout, move || {
			let mailbox = mailbox.clone();
			let idle = IdleTimeout {
				generation: generation.load(Ordering::Acquire),
			};
			async move {
				let _ = mailbox.send(Message::tell(Payload::new(idle))).await;
			}
		});
		*self.idle.lock() = Some(timer);
	}

	fn refresh_idle_timer(&self) {
		if let (Some(timeout), Some(timer)) = (self.definition.idle(), self.idle.lock().as_ref()) {
			self.idle_generation.fetch_add(1, Ordering::AcqRel);
			timer.reset(timeout);
		}
	}

	fn cancel_idle_timer(&self) {
		if let Some(timer) = self.idle.lock().take() {
			timer.stop();
		}
	}

	fn report_hook_failure(&self, err: &ActorError) {
		tracing::warn!(actor = %self.path, error = %err, "actor.hook.failed");
	}

	/// Startup was aborted: close without running the loop, then tell the parent.
	fn abort(self: &Arc<Self>, rx: &mut MailboxReceiver<Message>) {
		let parent = self.finish(rx);
		self.notify_parent(parent);
	}

	/// Closes the mailbox, answers whatever was still queued, marks the
	/// actor stopped and detaches it from its parent.
	fn finish(&self, rx: &mut MailboxReceiver<Message>) -> Option<Arc<Runnable>> {
		let leftovers = rx.close_and_drain();
		self.set_state(Lifecycle::Stopped);
		for mut message in leftovers {
			let reply = if message.payload().is::<Stop>() {
				Reply::Stopped
			} else {
				Reply::Error(ActorError::Closed)
			};
			message.reply(reply);
		}
		self.children.lock().clear();
		let Some(link) = self.parent.lock().take() else {
			// Only the root has no parent link.
			self.core.mark_terminated();
			return None;
		};
		link.upgrade()
	}

	fn notify_parent(&self, parent: Option<Arc<Runnable>>) {
		let Some(parent) = parent else {
			return;
		};
		let parent_ref = parent.actor_ref();
		let path = self.path.clone();
		spawn(TaskKind::Notify, async move {
			if let Err(err) = parent_ref.send(ChildStopped { path }).await {
				tracing::trace!(actor = %parent_ref.path(), error = %err, "actor.child_stopped.undelivered");
			}
		});
	}
}

fn child_path(parent: &str, name: &str) -> String {
	if parent == "/" { format!("/{name}") } else { format!("{parent}/{name}") }
}

fn generated_name() -> String {
	let id = uuid::Uuid::new_v4().simple().to_string();
	format!("${}", &id[..12])
}
