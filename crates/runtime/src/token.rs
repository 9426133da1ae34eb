use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ActorError;

/// Cancellable, optionally deadline-bound request context.
///
/// Every message carries one. Handlers and hooks receive a child of it
/// through their [`Context`](crate::Context), so cancelling the caller's
/// scope reaches all work done on its behalf.
#[derive(Debug, Clone, Default)]
pub struct Scope {
	cancel: CancellationToken,
	deadline: Option<Instant>,
	budget: Option<Duration>,
}

impl Scope {
	/// Creates a root scope with no deadline.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a child scope sharing this scope's deadline.
	pub fn child(&self) -> Self {
		Self {
			cancel: self.cancel.child_token(),
			deadline: self.deadline,
			budget: self.budget,
		}
	}

	/// Creates a child scope that expires after `timeout`, or at this scope's
	/// own deadline if that comes first.
	pub fn with_timeout(&self, timeout: Duration) -> Self {
		let deadline = Instant::now() + timeout;
		match self.deadline {
			Some(existing) if existing <= deadline => self.child(),
			_ => Self {
				cancel: self.cancel.child_token(),
				deadline: Some(deadline),
				budget: Some(timeout),
			},
		}
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Time left before the deadline, if one is set.
	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
	}

	/// Requests cancellation of this scope and all of its children.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns true once cancelled or past the deadline.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled() || self.is_expired()
	}

	/// Resolves on cancellation or when the deadline passes.
	pub async fn cancelled(&self) {
		match self.deadline {
			Some(deadline) => {
				tokio::select! {
					() = self.cancel.cancelled() => {}
					() = tokio::time::sleep_until(deadline) => {}
				}
			}
			None => self.cancel.cancelled().await,
		}
	}

	fn is_expired(&self) -> bool {
		self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
	}

	/// The error a waiter reports when this scope ends before a reply.
	pub(crate) fn interruption(&self) -> ActorError {
		if self.is_expired() {
			ActorError::Timeout(self.budget.unwrap_or_default())
		} else {
			ActorError::Cancelled
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn deadline_expires_scope() {
		let scope = Scope::new().with_timeout(Duration::from_millis(50));
		assert!(!scope.is_cancelled());
		scope.cancelled().await;
		assert!(scope.is_cancelled());
		assert_eq!(scope.interruption(), ActorError::Timeout(Duration::from_millis(50)));
	}

	#[tokio::test]
	async fn cancelling_parent_reaches_children() {
		let parent = Scope::new();
		let child = parent.child().with_timeout(Duration::from_secs(60));
		parent.cancel();
		assert!(child.is_cancelled());
		assert_eq!(child.interruption(), ActorError::Cancelled);
	}

	#[tokio::test(start_paused = true)]
	async fn child_never_outlives_parent_deadline() {
		let parent = Scope::new().with_timeout(Duration::from_millis(10));
		let child = parent.with_timeout(Duration::from_secs(10));
		assert_eq!(child.deadline(), parent.deadline());
	}
}
