use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::control::Stop;
use crate::error::{ActorError, Result};
use crate::mailbox::{MailboxSendError, MailboxSender};
use crate::message::{Message, Payload, Reply};
use crate::token::Scope;

/// Addressable handle to an actor.
///
/// Cheap to clone. Stays usable after the actor stops: sends then fail with
/// [`ActorError::Closed`] instead of blocking.
#[derive(Clone)]
pub struct ActorRef {
	name: Arc<str>,
	path: Arc<str>,
	mailbox: MailboxSender<Message>,
}

impl ActorRef {
	pub(crate) fn new(name: &str, path: &str, mailbox: MailboxSender<Message>) -> Self {
		Self {
			name: name.into(),
			path: path.into(),
			mailbox,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Number of queued, not yet dispatched messages.
	pub fn len(&self) -> usize {
		self.mailbox.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.mailbox.capacity()
	}

	/// True once the actor stopped accepting messages.
	pub fn is_closed(&self) -> bool {
		self.mailbox.is_closed()
	}

	/// True when both refs point at the same actor instance.
	pub fn same_actor(&self, other: &ActorRef) -> bool {
		self.mailbox.same_mailbox(&other.mailbox)
	}

	/// Fire-and-forget send. Waits while the mailbox is full.
	pub async fn send<T: Send + 'static>(&self, payload: T) -> Result<()> {
		self.send_payload(Payload::new(payload)).await
	}

	/// Sends an already type-erased payload.
	pub async fn send_payload(&self, payload: Payload) -> Result<()> {
		tracing::trace!(actor = %self.path, payload = payload.type_name(), "actor.send");
		self.enqueue(Message::tell(payload)).await
	}

	/// Fire-and-forget send that never waits.
	pub fn try_send<T: Send + 'static>(&self, payload: T) -> Result<()> {
		self.mailbox.try_send(Message::tell(Payload::new(payload))).map_err(|err| match err {
			MailboxSendError::Closed(_) => ActorError::Closed,
			MailboxSendError::Full(_) => ActorError::MailboxFull,
		})
	}

	/// Re-enqueues an existing message here, reply slot included, so this
	/// actor answers the original caller.
	pub async fn forward(&self, message: Message) -> Result<()> {
		tracing::trace!(actor = %self.path, payload = message.payload().type_name(), "actor.forward");
		match self.mailbox.send(message).await {
			Ok(()) => Ok(()),
			Err(err) => {
				let mut message = err.into_inner();
				message.reply(Reply::Error(ActorError::Closed));
				Err(ActorError::Closed)
			}
		}
	}

	/// Sends `payload` and waits at most `timeout` for the raw reply.
	///
	/// On timeout the message's scope is cancelled, so a message that has not
	/// been dispatched yet is dropped by the target instead of processed late.
	pub async fn ask_reply<T: Send + 'static>(&self, payload: T, timeout: Duration) -> Result<Reply> {
		let scope = Scope::new().with_timeout(timeout);
		let exchange = async {
			let pending = self.request(&scope, payload).await?;
			pending.wait().await
		};
		let outcome = tokio::time::timeout(timeout, exchange).await;
		match outcome {
			Ok(Ok(reply)) => Ok(reply),
			Ok(Err(ActorError::Timeout(_))) | Err(_) => {
				scope.cancel();
				tracing::debug!(actor = %self.path, ?timeout, "actor.ask.timeout");
				Err(ActorError::Timeout(timeout))
			}
			Ok(Err(err)) => Err(err),
		}
	}

	/// Sends `payload` and waits at most `timeout` for a typed result.
	pub async fn ask<R: Send + 'static>(&self, payload: impl Send + 'static, timeout: Duration) -> Result<R> {
		self.ask_reply(payload, timeout).await?.into_result()
	}

	/// Enqueues `payload` under a child of `scope` and returns the pending reply.
	///
	/// No internal timeout: cancelling `scope`, or its deadline passing, ends
	/// both the enqueue wait and [`PendingReply::wait`].
	pub async fn request<T: Send + 'static>(&self, scope: &Scope, payload: T) -> Result<PendingReply> {
		if scope.is_cancelled() {
			return Err(scope.interruption());
		}
		let scope = scope.child();
		let (message, rx) = Message::request(Payload::new(payload), scope.clone());
		tracing::trace!(actor = %self.path, payload = message.payload().type_name(), "actor.request");
		tokio::select! {
			biased;
			sent = self.enqueue(message) => sent?,
			() = scope.cancelled() => return Err(scope.interruption()),
		}
		Ok(PendingReply { rx, scope })
	}

	/// [`request`](Self::request) followed by a typed wait.
	pub async fn request_value<R: Send + 'static>(&self, scope: &Scope, payload: impl Send + 'static) -> Result<R> {
		self.request(scope, payload).await?.wait().await?.into_result()
	}

	/// Stops the actor and its subtree, waiting at most `timeout`.
	///
	/// Stopping an actor that already stopped succeeds.
	pub async fn stop(&self, timeout: Duration) -> Result<()> {
		match self.ask_reply(Stop, timeout).await {
			Ok(Reply::Stopped) | Err(ActorError::Closed) => Ok(()),
			Ok(Reply::Error(err)) | Err(err) => Err(err),
			Ok(other) => Err(ActorError::UnexpectedReply {
				expected: "stopped",
				found: other.kind(),
			}),
		}
	}

	async fn enqueue(&self, message: Message) -> Result<()> {
		self.mailbox.send(message).await.map_err(|_| ActorError::Closed)
	}
}

impl fmt::Debug for ActorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorRef")
			.field("path", &self.path)
			.field("len", &self.len())
			.field("capacity", &self.capacity())
			.finish()
	}
}

/// A reply that has been requested but not yet received.
#[derive(Debug)]
pub struct PendingReply {
	rx: tokio::sync::oneshot::Receiver<Reply>,
	scope: Scope,
}

impl PendingReply {
	/// Waits for the reply, giving up when the request scope ends.
	pub async fn wait(self) -> Result<Reply> {
		let Self { rx, scope } = self;
		tokio::select! {
			biased;
			reply = rx => reply.map_err(|_| ActorError::NoReply),
			() = scope.cancelled() => Err(scope.interruption()),
		}
	}

	/// Abandons the request; the target drops it if not yet dispatched.
	pub fn cancel(self) {
		self.scope.cancel();
	}
}
