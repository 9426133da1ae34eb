use std::sync::Arc;
use std::time::Duration;

use clove_config::HookErrorPolicy;

use super::{Lifecycle, Runnable};
use crate::control::Stop;
use crate::definition::{DispatchMode, HookKind};
use crate::error::{ActorError, Result};
use crate::mailbox::MailboxReceiver;
use crate::message::{Message, Reply};

impl Runnable {
	/// Supervised stop: `pre_stop`, then every child in creation order (each
	/// fully stopped before the next), then `post_stop`, then close.
	///
	/// The mailbox is closed before `request` is answered, so anyone who saw
	/// `Stopped` finds later sends failing fast.
	pub(super) async fn stop(self: &Arc<Self>, mut request: Message, rx: &mut MailboxReceiver<Message>) {
		self.set_state(Lifecycle::StoppingSelf);
		tracing::debug!(actor = %self.path, "actor.stop");
		let mut failures = Vec::new();

		if let Err(err) = self.run_hook(HookKind::PreStop).await {
			self.report_hook_failure(&err);
			failures.push(err);
		}
		self.cancel_idle_timer();
		self.drain_dispatches().await;

		self.set_state(Lifecycle::StoppingChildren);
		let children = self.children.lock().clone();
		for child in children {
			if let Err(err) = self.stop_child(&child).await {
				failures.push(err);
			}
			self.remove_child(&child.path);
		}

		if let Err(err) = self.run_hook(HookKind::PostStop).await {
			self.report_hook_failure(&err);
			failures.push(err);
		}

		let parent = self.finish(rx);
		let reply = match failures.into_iter().next() {
			Some(err) if self.settings.hook_errors == HookErrorPolicy::FailFast => Reply::Error(err),
			_ => Reply::Stopped,
		};
		request.reply(reply);
		tracing::debug!(actor = %self.path, "actor.stopped");
		self.notify_parent(parent);
	}

	async fn stop_child(&self, child: &Arc<Runnable>) -> Result<()> {
		let timeout = child.stop_budget();
		match child.actor_ref().ask_reply(Stop, timeout).await {
			Ok(Reply::Stopped) | Err(ActorError::Closed) => {
				tracing::trace!(actor = %self.path, child = %child.path, "actor.stop.child");
				Ok(())
			}
			Ok(Reply::Error(err)) => {
				tracing::warn!(actor = %self.path, child = %child.path, error = %err, "actor.stop.child_failed");
				Err(err)
			}
			Ok(other) => {
				tracing::warn!(actor = %self.path, child = %child.path, reply = other.kind(), "actor.stop.child_unexpected");
				Ok(())
			}
			Err(err) => {
				tracing::warn!(actor = %self.path, child = %child.path, error = %err, "actor.stop.child_skipped");
				Err(err)
			}
		}
	}

	/// Longest this actor may take to answer `Stop` while every hook and
	/// descendant stays within its own timeouts, plus `stop_timeout` of slack.
	pub(super) fn stop_budget(&self) -> Duration {
		let drain = match self.definition.mode() {
			DispatchMode::Async => self.settings.pre_stop_timeout,
			DispatchMode::Sync => Duration::ZERO,
		};
		let own = [self.settings.pre_stop_timeout, drain, self.settings.post_stop_timeout, self.settings.stop_timeout];
		own.into_iter()
			.chain(self.children().iter().map(|child| child.stop_budget()))
			.fold(Duration::ZERO, Duration::saturating_add)
	}

	/// Waits for in-flight async dispatches, bounded by the pre-stop timeout.
	async fn drain_dispatches(&self) {
		if self.definition.mode() != DispatchMode::Async {
			return;
		}
		let wait = self.dispatch_limit.acquire_many(self.dispatch_permits);
		match tokio::time::timeout(self.settings.pre_stop_timeout, wait).await {
			Ok(Ok(permits)) => drop(permits),
			Ok(Err(_)) => {}
			Err(_) => {
				tracing::warn!(actor = %self.path, "actor.stop.dispatch_drain_timeout");
			}
		}
	}
}
