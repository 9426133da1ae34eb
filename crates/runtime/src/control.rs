//! Control payloads handled by the message loop itself, never by behaviors.

/// Stop command.
///
/// Asking an actor with `Stop` waits until its whole subtree has stopped and
/// yields [`Reply::Stopped`](crate::Reply::Stopped).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stop;

/// Sent upward by a child once it has fully stopped.
#[derive(Debug, Clone)]
pub(crate) struct ChildStopped {
	pub(crate) path: String,
}

/// Enqueued by the idle timer when an actor saw no traffic for too long.
///
/// Carries the timer generation it was armed under; a refresh after it was
/// queued makes it stale.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdleTimeout {
	pub(crate) generation: u64,
}
