use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clove_config::ActorSettings;

use crate::context::Context;
use crate::dispatch::{Behavior, BoxFuture, ContextOnly, NoArgs, into_actor_error};
use crate::error::{ActorError, Result};

/// How the message loop hands messages to the behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DispatchMode {
	/// One message at a time; the loop waits for each handler to finish.
	#[default]
	Sync,
	/// Each message runs on its own task, bounded by the actor's
	/// dispatch limit. Completion order is not guaranteed.
	Async,
}

/// Lifecycle hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
	PreStart,
	PostStart,
	PreStop,
	PostStop,
}

impl HookKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::PreStart => "pre_start",
			Self::PostStart => "post_start",
			Self::PreStop => "pre_stop",
			Self::PostStop => "post_stop",
		}
	}

	pub(crate) fn timeout(self, settings: &ActorSettings) -> Duration {
		match self {
			Self::PreStart => settings.pre_start_timeout,
			Self::PostStart => settings.post_start_timeout,
			Self::PreStop => settings.pre_stop_timeout,
			Self::PostStop => settings.post_stop_timeout,
		}
	}
}

impl fmt::Display for HookKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lifecycle hooks implemented by a behavior's state object.
///
/// Enabled with [`Capabilities::lifecycle`](crate::Capabilities::lifecycle).
/// Each runs after the definition's own hook of the same kind.
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
	async fn pre_start(&self, _ctx: &Context) -> Result<()> {
		Ok(())
	}

	async fn post_start(&self, _ctx: &Context) -> Result<()> {
		Ok(())
	}

	async fn pre_stop(&self, _ctx: &Context) -> Result<()> {
		Ok(())
	}

	async fn post_stop(&self, _ctx: &Context) -> Result<()> {
		Ok(())
	}
}

pub(crate) async fn run_lifecycle(lifecycle: &dyn Lifecycle, kind: HookKind, ctx: &Context) -> Result<()> {
	match kind {
		HookKind::PreStart => lifecycle.pre_start(ctx).await,
		HookKind::PostStart => lifecycle.post_start(ctx).await,
		HookKind::PreStop => lifecycle.pre_stop(ctx).await,
		HookKind::PostStop => lifecycle.post_stop(ctx).await,
	}
}

/// Type-erased lifecycle hook.
pub(crate) type Hook = Arc<dyn Fn(Context) -> BoxFuture<Result<()>> + Send + Sync>;

/// Values a hook may return: `()` or `Result<(), E>`.
pub trait HookOutput: Send + 'static {
	fn into_outcome(self) -> Result<()>;
}

impl HookOutput for () {
	fn into_outcome(self) -> Result<()> {
		Ok(())
	}
}

impl<E: fmt::Display + Send + 'static> HookOutput for std::result::Result<(), E> {
	fn into_outcome(self) -> Result<()> {
		self.map_err(into_actor_error)
	}
}

/// Closures accepted as lifecycle hooks: `Fn()` or `Fn(Context)`.
pub trait IntoHook<M>: Send + Sync + 'static {
	fn into_hook(self) -> Hook;
}

impl<F, Fut> IntoHook<NoArgs> for F
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: HookOutput,
{
	fn into_hook(self) -> Hook {
		Arc::new(move |_ctx: Context| -> BoxFuture<Result<()>> {
			let fut = self();
			Box::pin(async move { fut.await.into_outcome() })
		})
	}
}

impl<F, Fut> IntoHook<ContextOnly> for F
where
	F: Fn(Context) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: HookOutput,
{
	fn into_hook(self) -> Hook {
		Arc::new(move |ctx: Context| -> BoxFuture<Result<()>> {
			let fut = self(ctx);
			Box::pin(async move { fut.await.into_outcome() })
		})
	}
}

#[derive(Clone, Default)]
struct Hooks {
	pre_start: Option<Hook>,
	post_start: Option<Hook>,
	pre_stop: Option<Hook>,
	post_stop: Option<Hook>,
}

/// Immutable template an actor is instantiated from.
///
/// ```ignore
/// let def = Definition::new("ticker", behavior)
/// 	.queue_capacity(4)
/// 	.idle_timeout(Duration::from_secs(30))
/// 	.post_stop(|ctx: Context| async move { ctx.info("bye") });
/// ```
#[derive(Clone)]
pub struct Definition {
	name: String,
	behavior: Behavior,
	queue_capacity: Option<usize>,
	mode: DispatchMode,
	idle_timeout: Option<Duration>,
	refresh_on_message: bool,
	hooks: Hooks,
}

impl Definition {
	/// An empty `name` makes the runtime generate a unique one.
	pub fn new(name: impl Into<String>, behavior: impl Into<Behavior>) -> Self {
		Self {
			name: name.into(),
			behavior: behavior.into(),
			queue_capacity: None,
			mode: DispatchMode::Sync,
			idle_timeout: None,
			refresh_on_message: false,
			hooks: Hooks::default(),
		}
	}

	/// Same definition under another name.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Mailbox capacity; overrides the settings value.
	pub fn queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = Some(capacity);
		self
	}

	pub fn dispatch(mut self, mode: DispatchMode) -> Self {
		self.mode = mode;
		self
	}

	/// Stops the actor after `timeout` without traffic.
	///
	/// The timer only restarts on messages when
	/// [`refresh_on_message`](Self::refresh_on_message) is set.
	pub fn idle_timeout(mut self, timeout: Duration) -> Self {
		self.idle_timeout = Some(timeout);
		self
	}

	pub fn refresh_on_message(mut self, refresh: bool) -> Self {
		self.refresh_on_message = refresh;
		self
	}

	pub fn pre_start<M>(mut self, hook: impl IntoHook<M>) -> Self {
		self.hooks.pre_start = Some(hook.into_hook());
		self
	}

	pub fn post_start<M>(mut self, hook: impl IntoHook<M>) -> Self {
		self.hooks.post_start = Some(hook.into_hook());
		self
	}

	pub fn pre_stop<M>(mut self, hook: impl IntoHook<M>) -> Self {
		self.hooks.pre_stop = Some(hook.into_hook());
		self
	}

	pub fn post_stop<M>(mut self, hook: impl IntoHook<M>) -> Self {
		self.hooks.post_stop = Some(hook.into_hook());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn behavior(&self) -> &Behavior {
		&self.behavior
	}

	pub fn capacity(&self) -> Option<usize> {
		self.queue_capacity
	}

	pub fn mode(&self) -> DispatchMode {
		self.mode
	}

	pub fn idle(&self) -> Option<Duration> {
		self.idle_timeout
	}

	pub fn refreshes_on_message(&self) -> bool {
		self.refresh_on_message
	}

	/// Checks everything the type system does not.
	pub fn validate(&self) -> Result<()> {
		if self.behavior.is_empty() && self.behavior.lifecycle().is_none() {
			return Err(ActorError::Validation(format!("actor '{}' has no handlers", self.name)));
		}
		if self.queue_capacity == Some(0) {
			return Err(ActorError::Validation(format!("actor '{}' has a zero queue capacity", self.name)));
		}
		if self.name.contains('/') || self.name == "." || self.name == ".." {
			return Err(ActorError::Validation(format!("'{}' is not a valid actor name", self.name)));
		}
		if self.idle_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(ActorError::Validation(format!("actor '{}' has a zero idle timeout", self.name)));
		}
		Ok(())
	}

	pub(crate) fn hook(&self, kind: HookKind) -> Option<Hook> {
		match kind {
			HookKind::PreStart => self.hooks.pre_start.clone(),
			HookKind::PostStart => self.hooks.post_start.clone(),
			HookKind::PreStop => self.hooks.pre_stop.clone(),
			HookKind::PostStop => self.hooks.post_stop.clone(),
		}
	}
}

impl fmt::Debug for Definition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Definition")
			.field("name", &self.name)
			.field("behavior", &self.behavior)
			.field("queue_capacity", &self.queue_capacity)
			.field("mode", &self.mode)
			.field("idle_timeout", &self.idle_timeout)
			.field("refresh_on_message", &self.refresh_on_message)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn noop() -> Behavior {
		Behavior::new().on(|_: u32| async {})
	}

	#[test]
	fn rejects_empty_behavior() {
		let err = Definition::new("a", Behavior::new()).validate().unwrap_err();
		assert!(matches!(err, ActorError::Validation(_)), "got {err:?}");
	}

	#[test]
	fn rejects_bad_names_and_capacity() {
		for name in ["a/b", ".", ".."] {
			assert!(Definition::new(name, noop()).validate().is_err(), "{name} should be rejected");
		}
		assert!(Definition::new("a", noop()).queue_capacity(0).validate().is_err());
		assert!(Definition::new("a", noop()).idle_timeout(Duration::ZERO).validate().is_err());
	}

	#[test]
	fn accepts_anonymous_definitions() {
		Definition::new("", noop()).validate().unwrap();
	}

	#[test]
	fn hooks_accept_both_shapes() {
		let def = Definition::new("a", noop())
			.pre_start(|| async {})
			.post_start(|_ctx: Context| async { Ok::<(), ActorError>(()) })
			.pre_stop(|| async { Err::<(), _>("nope") });
		assert!(def.hook(HookKind::PreStart).is_some());
		assert!(def.hook(HookKind::PostStart).is_some());
		assert!(def.hook(HookKind::PreStop).is_some());
		assert!(def.hook(HookKind::PostStop).is_none());
	}
}
