//! The pub/sub actor living at `/core/pubsub`.
//!
//! Keeps one subscription per subscriber path. Publishing enqueues a copy of
//! the value into every subscriber whose filter accepts it; the publisher is
//! answered once all copies are enqueued, not once they are processed.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::definition::Definition;
use crate::dispatch::Behavior;
use crate::error::ActorError;
use crate::message::Payload;
use crate::reference::ActorRef;

pub(crate) const NAME: &str = "pubsub";

/// A published value, shared between all matching subscribers.
#[derive(Clone)]
pub struct Broadcast {
	value: Arc<dyn Any + Send + Sync>,
	type_name: &'static str,
	to_payload: Arc<dyn Fn() -> Payload + Send + Sync>,
}

impl Broadcast {
	pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
		let shared = Arc::new(value);
		let source = Arc::clone(&shared);
		Self {
			value: shared,
			type_name: type_name::<T>(),
			to_payload: Arc::new(move || Payload::new(T::clone(&source))),
		}
	}

	pub fn value(&self) -> &(dyn Any + Send + Sync) {
		self.value.as_ref()
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// A fresh copy of the value for one subscriber's mailbox.
	pub fn to_payload(&self) -> Payload {
		(self.to_payload)()
	}
}

impl fmt::Debug for Broadcast {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Broadcast").field("type", &self.type_name).finish_non_exhaustive()
	}
}

/// Pure predicate deciding which published values a subscriber receives.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>);

impl Filter {
	pub fn new(predicate: impl Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync + 'static) -> Self {
		Self(Arc::new(predicate))
	}

	/// Accepts every value.
	pub fn all() -> Self {
		Self::new(|_| true)
	}

	/// Accepts values of type `T`.
	pub fn of<T: 'static>() -> Self {
		Self::new(|value| value.is::<T>())
	}

	/// Accepts values of type `T` for which `predicate` holds.
	pub fn when<T: 'static>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
		Self::new(move |value| value.downcast_ref::<T>().is_some_and(&predicate))
	}

	pub fn accepts(&self, broadcast: &Broadcast) -> bool {
		(self.0)(broadcast.value())
	}
}

impl fmt::Debug for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Filter(..)")
	}
}

/// Registers or replaces the subscription of `subscriber`.
#[derive(Debug, Clone)]
pub struct Subscribe {
	pub subscriber: ActorRef,
	pub filter: Filter,
}

/// Removes the subscription of `subscriber`.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
	pub subscriber: ActorRef,
}

/// Broadcasts the wrapped value.
#[derive(Debug, Clone)]
pub struct Publish(pub Broadcast);

impl Publish {
	pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
		Self(Broadcast::new(value))
	}
}

struct Subscription {
	subscriber: ActorRef,
	filter: Filter,
}

#[derive(Default)]
struct PubSub {
	subscriptions: Mutex<Vec<Subscription>>,
}

impl PubSub {
	async fn subscribe(self: Arc<Self>, request: Subscribe) {
		let mut subscriptions = self.subscriptions.lock();
		subscriptions.retain(|existing| existing.subscriber.path() != request.subscriber.path() && !existing.subscriber.is_closed());
		tracing::trace!(subscriber = %request.subscriber.path(), "pubsub.subscribe");
		subscriptions.push(Subscription {
			subscriber: request.subscriber,
			filter: request.filter,
		});
	}

	async fn unsubscribe(self: Arc<Self>, request: Unsubscribe) {
		tracing::trace!(subscriber = %request.subscriber.path(), "pubsub.unsubscribe");
		self.subscriptions
			.lock()
			.retain(|existing| existing.subscriber.path() != request.subscriber.path());
	}

	async fn publish(self: Arc<Self>, Publish(broadcast): Publish) {
		let targets: Vec<ActorRef> = self
			.subscriptions
			.lock()
			.iter()
			.filter(|subscription| subscription.filter.accepts(&broadcast))
			.map(|subscription| subscription.subscriber.clone())
			.collect();

		let mut undeliverable = false;
		for target in targets {
			if let Err(err) = target.send_payload(broadcast.to_payload()).await {
				tracing::trace!(subscriber = %target.path(), payload = broadcast.type_name(), error = %err, "pubsub.undelivered");
				undeliverable |= err == ActorError::Closed;
			}
		}
		if undeliverable {
			// Subscribers that stopped are dropped lazily.
			self.subscriptions.lock().retain(|subscription| !subscription.subscriber.is_closed());
		}
	}

	fn len(&self) -> usize {
		self.subscriptions.lock().len()
	}
}

/// Number of live subscriptions, answered to a [`SubscriptionCount`] ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionCount;

pub(crate) fn definition() -> Definition {
	let state = Arc::new(PubSub::default());
	let behavior = Behavior::with_state(state)
		.on(PubSub::subscribe)
		.on(PubSub::unsubscribe)
		.on(PubSub::publish)
		.on(|pubsub: Arc<PubSub>, _: SubscriptionCount| async move { pubsub.len() });
	Definition::new(NAME, behavior)
}
