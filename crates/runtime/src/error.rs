//! Error taxonomy shared by every runtime operation.

use std::time::Duration;

use thiserror::Error;

use crate::definition::HookKind;

/// Errors surfaced by actor creation, messaging, lookup and supervision.
///
/// Creation and lookup errors are returned synchronously. Dispatch errors
/// travel back through the reply slot of the message that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorError {
	/// The definition cannot be instantiated.
	#[error("invalid actor definition: {0}")]
	Validation(String),

	/// A live child with the same name already exists under the parent.
	#[error("actor '{name}' already exists under {parent}")]
	DuplicateChild { parent: String, name: String },

	/// Path resolution found nothing.
	#[error("no actor at path '{0}'")]
	NotFound(String),

	/// An ask, request or stop wait ran out of time.
	#[error("timed out after {0:?}")]
	Timeout(Duration),

	/// The behavior has no handler for the payload type.
	#[error("no handler for payload of type {0}")]
	NoHandler(&'static str),

	/// A lifecycle hook returned an error, panicked or timed out.
	#[error("{hook} hook failed for {path}: {message}")]
	LifecycleHook { path: String, hook: HookKind, message: String },

	/// The target actor has stopped and no longer accepts messages.
	#[error("actor mailbox is closed")]
	Closed,

	/// A non-blocking send found the mailbox at capacity.
	#[error("actor mailbox is full")]
	MailboxFull,

	/// The caller's scope was cancelled before a reply arrived.
	#[error("request cancelled")]
	Cancelled,

	/// The message was dropped without anyone writing its reply slot.
	#[error("actor dropped the request without replying")]
	NoReply,

	/// A handler panicked while processing the message.
	#[error("handler panicked: {0}")]
	Panicked(String),

	/// The reply did not carry the type the caller asked for.
	#[error("unexpected reply: expected {expected}, found {found}")]
	UnexpectedReply { expected: &'static str, found: &'static str },

	/// The actor refuses this kind of message outright.
	#[error("{0}")]
	Unsupported(String),

	/// The actor system has shut down.
	#[error("actor system has terminated")]
	Terminated,

	/// A handler returned an error value.
	#[error("{0}")]
	Handler(String),
}

/// Result type for runtime operations.
pub type Result<T, E = ActorError> = std::result::Result<T, E>;
