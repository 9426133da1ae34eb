//! Capability dispatch: picks the handler that processes a message.
//!
//! Handlers are registered up front into a table keyed by the payload's
//! `TypeId`. Each key holds its candidates already sorted by preference, so
//! resolving a message is one hash lookup:
//!
//! 1. typed handlers for the payload type, context-aware before context-less,
//!    then by [`Returns`] order;
//! 2. the raw message handler, if any;
//! 3. payload-less fallbacks, ranked the same way.
//!
//! Anything else is answered with [`ActorError::NoHandler`].

mod handler;
mod reply;
#[cfg(test)]
mod tests;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub use self::handler::{BoxFuture, Callback, ContextOnly, Handler, Method, NoArgs, PayloadOnly, WithContext};
pub(crate) use self::reply::into_actor_error;
pub use self::reply::{IntoReply, Returns, Value};
use crate::context::Context;
use crate::definition::Lifecycle;
use crate::error::ActorError;
use crate::message::{Message, Payload, Reply};

pub(crate) type ErasedHandler = Arc<dyn Fn(Context, Payload) -> BoxFuture<Reply> + Send + Sync>;
pub(crate) type ErasedMessageHandler = Arc<dyn Fn(Context, Message) -> BoxFuture<()> + Send + Sync>;

/// Parameter and return shape of one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
	pub context: bool,
	pub payload: bool,
	pub returns: Returns,
}

impl Shape {
	fn rank(self) -> (bool, Returns) {
		(!self.context, self.returns)
	}
}

#[derive(Clone)]
struct Registration {
	shape: Shape,
	call: ErasedHandler,
}

#[derive(Clone, Default)]
struct Table {
	typed: HashMap<TypeId, Vec<Registration>>,
	message: Option<ErasedMessageHandler>,
	fallback: Vec<Registration>,
}

/// Outcome of resolving one payload type against a behavior.
pub(crate) enum Resolution {
	Handler(ErasedHandler),
	Message(ErasedMessageHandler),
	Unhandled,
}

/// How an actor responds to messages.
///
/// ```ignore
/// let behavior = Behavior::new()
/// 	.on(|ping: Ping| async move { ping.0 + 1 })
/// 	.on(|ctx: Context, stop: Halt| async move { ctx.stop() });
/// ```
#[derive(Clone, Default)]
pub struct Behavior {
	table: Arc<Table>,
	lifecycle: Option<Arc<dyn Lifecycle>>,
}

impl Behavior {
	pub fn new() -> Self {
		Self::default()
	}

	/// Behavior made of a single function.
	pub fn from_fn<T, M, H>(handler: H) -> Self
	where
		T: Send + 'static,
		H: Handler<T, M>,
	{
		Self::new().on(handler)
	}

	/// Capability-set behavior over shared state.
	pub fn with_state<S: Send + Sync + 'static>(state: Arc<S>) -> Capabilities<S> {
		Capabilities {
			state,
			behavior: Self::new(),
		}
	}

	/// Registers a handler for payloads of type `T`.
	pub fn on<T, M, H>(self, handler: H) -> Self
	where
		T: Send + 'static,
		H: Handler<T, M>,
	{
		self.register::<T, H::Output>(H::CONTEXT, move |ctx, payload| handler.call(ctx, payload))
	}

	/// Registers a handler invoked when no typed handler matches.
	pub fn on_any<M, C: Callback<M>>(mut self, callback: C) -> Self {
		let shape = Shape {
			context: C::CONTEXT,
			payload: false,
			returns: C::Output::returns(),
		};
		let call: ErasedHandler = Arc::new(move |ctx: Context, _payload: Payload| -> BoxFuture<Reply> {
			let fut = callback.call(ctx);
			Box::pin(async move { fut.await.into_reply() })
		});
		let table = Arc::make_mut(&mut self.table);
		table.fallback.push(Registration { shape, call });
		table.fallback.sort_by_key(|entry| entry.shape.rank());
		self
	}

	/// Registers a handler that receives the whole message, reply slot
	/// included, for payloads no typed handler accepts.
	pub fn on_message<F, Fut>(mut self, handler: F) -> Self
	where
		F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let call: ErasedMessageHandler = Arc::new(move |ctx: Context, message: Message| -> BoxFuture<()> { Box::pin(handler(ctx, message)) });
		Arc::make_mut(&mut self.table).message = Some(call);
		self
	}

	/// True when no handler of any kind is registered.
	pub fn is_empty(&self) -> bool {
		self.table.typed.is_empty() && self.table.message.is_none() && self.table.fallback.is_empty()
	}

	/// Whether a typed handler accepts `T`.
	pub fn handles<T: 'static>(&self) -> bool {
		self.table.typed.contains_key(&TypeId::of::<T>())
	}

	/// Shapes registered for `T`, best match first.
	pub fn shapes<T: 'static>(&self) -> Vec<Shape> {
		self.table
			.typed
			.get(&TypeId::of::<T>())
			.map(|entries| entries.iter().map(|entry| entry.shape).collect())
			.unwrap_or_default()
	}

	pub(crate) fn lifecycle(&self) -> Option<Arc<dyn Lifecycle>> {
		self.lifecycle.clone()
	}

	pub(crate) fn resolve(&self, type_id: TypeId) -> Resolution {
		if let Some(best) = self.table.typed.get(&type_id).and_then(|entries| entries.first()) {
			return Resolution::Handler(Arc::clone(&best.call));
		}
		if let Some(message) = &self.table.message {
			return Resolution::Message(Arc::clone(message));
		}
		match self.table.fallback.first() {
			Some(best) => Resolution::Handler(Arc::clone(&best.call)),
			None => Resolution::Unhandled,
		}
	}

	fn register<T, O>(mut self, context: bool, call: impl Fn(Context, T) -> BoxFuture<O> + Send + Sync + 'static) -> Self
	where
		T: Send + 'static,
		O: IntoReply,
	{
		let shape = Shape {
			context,
			payload: true,
			returns: O::returns(),
		};
		let call: ErasedHandler = Arc::new(move |ctx: Context, payload: Payload| -> BoxFuture<Reply> {
			match payload.downcast::<T>() {
				Ok(value) => {
					let fut = call(ctx, value);
					Box::pin(async move { fut.await.into_reply() })
				}
				Err(payload) => {
					let reply = Reply::Error(ActorError::NoHandler(payload.type_name()));
					Box::pin(async move { reply })
				}
			}
		});
		let entries = Arc::make_mut(&mut self.table).typed.entry(TypeId::of::<T>()).or_default();
		entries.push(Registration { shape, call });
		// Stable sort: among equal shapes the earliest registration wins.
		entries.sort_by_key(|entry| entry.shape.rank());
		self
	}
}

impl fmt::Debug for Behavior {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Behavior")
			.field("typed", &self.table.typed.len())
			.field("message", &self.table.message.is_some())
			.field("fallback", &self.table.fallback.len())
			.field("lifecycle", &self.lifecycle.is_some())
			.finish()
	}
}

/// Builder for a behavior whose handlers share one state object.
///
/// ```ignore
/// struct Counter(AtomicU64);
///
/// impl Counter {
/// 	async fn add(self: Arc<Self>, n: u64) -> u64 {
/// 		self.0.fetch_add(n, Ordering::SeqCst) + n
/// 	}
/// }
///
/// let behavior = Behavior::with_state(Arc::new(Counter(AtomicU64::new(0)))).on(Counter::add).build();
/// ```
pub struct Capabilities<S> {
	state: Arc<S>,
	behavior: Behavior,
}

impl<S: Send + Sync + 'static> Capabilities<S> {
	/// Registers a state-bound handler for payloads of type `T`.
	pub fn on<T, M, H>(mut self, method: H) -> Self
	where
		T: Send + 'static,
		H: Method<S, T, M>,
	{
		let state = Arc::clone(&self.state);
		self.behavior = self
			.behavior
			.register::<T, H::Output>(H::CONTEXT, move |ctx, payload| method.call(Arc::clone(&state), ctx, payload));
		self
	}

	/// Registers a payload-less fallback.
	pub fn on_any<M, C: Callback<M>>(mut self, callback: C) -> Self {
		self.behavior = self.behavior.on_any(callback);
		self
	}

	/// Runs the state's [`Lifecycle`] hooks alongside the definition's own.
	pub fn lifecycle(mut self) -> Self
	where
		S: Lifecycle,
	{
		let lifecycle: Arc<dyn Lifecycle> = self.state.clone();
		self.behavior.lifecycle = Some(lifecycle);
		self
	}

	pub fn state(&self) -> &Arc<S> {
		&self.state
	}

	pub fn build(self) -> Behavior {
		self.behavior
	}
}

impl<S> From<Capabilities<S>> for Behavior {
	fn from(capabilities: Capabilities<S>) -> Self {
		capabilities.behavior
	}
}
