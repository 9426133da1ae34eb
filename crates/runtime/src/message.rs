use std::any::{Any, TypeId, type_name};
use std::fmt;

use tokio::sync::oneshot;

use crate::error::ActorError;
use crate::token::Scope;

/// Type-erased message content.
///
/// Keeps the concrete `TypeId` and type name alongside the boxed value so the
/// dispatcher can pick a handler without downcasting first.
pub struct Payload {
	value: Box<dyn Any + Send>,
	type_id: TypeId,
	type_name: &'static str,
}

impl Payload {
	pub fn new<T: Send + 'static>(value: T) -> Self {
		Self {
			value: Box::new(value),
			type_id: TypeId::of::<T>(),
			type_name: type_name::<T>(),
		}
	}

	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn is<T: 'static>(&self) -> bool {
		self.type_id == TypeId::of::<T>()
	}

	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		self.value.downcast_ref::<T>()
	}

	/// Takes the value out, or hands the payload back untouched on a type mismatch.
	pub fn downcast<T: 'static>(self) -> Result<T, Payload> {
		if !self.is::<T>() {
			return Err(self);
		}
		let Self { value, type_id, type_name } = self;
		match value.downcast::<T>() {
			Ok(value) => Ok(*value),
			Err(value) => Err(Self { value, type_id, type_name }),
		}
	}
}

impl fmt::Debug for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Payload").field("type", &self.type_name).finish_non_exhaustive()
	}
}

/// What an actor writes back into a reply slot.
#[derive(Debug)]
pub enum Reply {
	/// The handler completed and declared no result.
	Done,
	/// Nothing to report.
	Nothing,
	/// The actor and its whole subtree stopped.
	Stopped,
	/// A handler result.
	Value(Payload),
	/// A handler error or a runtime failure.
	Error(ActorError),
}

impl Reply {
	pub fn value<T: Send + 'static>(value: T) -> Self {
		Self::Value(Payload::new(value))
	}

	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error(_))
	}

	/// Short description used in diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Done => "done",
			Self::Nothing => "nothing",
			Self::Stopped => "stopped",
			Self::Value(payload) => payload.type_name(),
			Self::Error(_) => "error",
		}
	}

	/// Converts into the caller's expected result type.
	///
	/// `Done`, `Nothing` and `Stopped` convert into `()`. Errors are returned
	/// as-is; any other mismatch is [`ActorError::UnexpectedReply`].
	pub fn into_result<T: Send + 'static>(self) -> Result<T, ActorError> {
		let found = self.kind();
		let mismatch = |_| ActorError::UnexpectedReply {
			expected: type_name::<T>(),
			found,
		};
		match self {
			Self::Value(payload) => payload.downcast::<T>().map_err(mismatch),
			Self::Error(err) => Err(err),
			Self::Done | Self::Nothing | Self::Stopped => Payload::new(()).downcast::<T>().map_err(mismatch),
		}
	}
}

impl From<ActorError> for Reply {
	fn from(err: ActorError) -> Self {
		Self::Error(err)
	}
}

/// One-shot reply channel attached to a message.
///
/// Written at most once; later writes are ignored and report `false`.
#[derive(Debug, Default)]
pub struct ReplySlot {
	tx: Option<oneshot::Sender<Reply>>,
}

impl ReplySlot {
	pub(crate) fn channel() -> (Self, oneshot::Receiver<Reply>) {
		let (tx, rx) = oneshot::channel();
		(Self { tx: Some(tx) }, rx)
	}

	/// Writes the reply. Returns `false` if the slot was already used, was
	/// never attached, or nobody is waiting any more.
	pub fn send(&mut self, reply: Reply) -> bool {
		match self.tx.take() {
			Some(tx) => tx.send(reply).is_ok(),
			None => false,
		}
	}

	/// True while a caller is still waiting on this slot.
	pub fn is_pending(&self) -> bool {
		self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
	}
}

/// A payload in flight, with its reply slot and request scope.
#[derive(Debug)]
pub struct Message {
	payload: Payload,
	reply: ReplySlot,
	scope: Scope,
}

impl Message {
	/// Fire-and-forget message without a reply slot.
	pub(crate) fn tell(payload: Payload) -> Self {
		Self {
			payload,
			reply: ReplySlot::default(),
			scope: Scope::new(),
		}
	}

	/// Message whose reply is awaited on the returned receiver.
	pub(crate) fn request(payload: Payload, scope: Scope) -> (Self, oneshot::Receiver<Reply>) {
		let (reply, rx) = ReplySlot::channel();
		(Self { payload, reply, scope }, rx)
	}

	pub fn payload(&self) -> &Payload {
		&self.payload
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	/// Writes the reply. See [`ReplySlot::send`].
	pub fn reply(&mut self, reply: Reply) -> bool {
		self.reply.send(reply)
	}

	pub fn expects_reply(&self) -> bool {
		self.reply.is_pending()
	}

	pub fn into_parts(self) -> (Payload, ReplySlot, Scope) {
		(self.payload, self.reply, self.scope)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_mismatch_returns_payload() {
		let payload = Payload::new(7u32);
		let payload = payload.downcast::<String>().unwrap_err();
		assert!(payload.is::<u32>());
		assert_eq!(payload.downcast::<u32>().unwrap(), 7);
	}

	#[tokio::test]
	async fn reply_is_written_at_most_once() {
		let (mut message, rx) = Message::request(Payload::new("ping"), Scope::new());
		assert!(message.expects_reply());
		assert!(message.reply(Reply::value(1u8)));
		assert!(!message.reply(Reply::value(2u8)));
		assert!(!message.expects_reply());

		let reply = rx.await.unwrap();
		assert_eq!(reply.into_result::<u8>().unwrap(), 1);
	}

	#[test]
	fn tell_has_no_reply_slot() {
		let mut message = Message::tell(Payload::new(()));
		assert!(!message.expects_reply());
		assert!(!message.reply(Reply::Done));
	}

	#[test]
	fn sentinels_convert_to_unit() {
		Reply::Done.into_result::<()>().unwrap();
		Reply::Stopped.into_result::<()>().unwrap();
		let err = Reply::Done.into_result::<u32>().unwrap_err();
		assert_eq!(err, ActorError::UnexpectedReply { expected: "u32", found: "done" });
	}
}
