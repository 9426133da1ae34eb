use std::sync::Arc;

use super::Runnable;
use crate::class::TaskKind;
use crate::context::Context;
use crate::definition::{HookKind, run_lifecycle};
use crate::error::{ActorError, Result};
use crate::spawn::{join_error_panic_message, spawn};
use crate::token::Scope;

impl Runnable {
	/// Runs the definition's hook and the behavior's lifecycle method for
	/// `kind` on their own task, bounded by the configured timeout.
	///
	/// On timeout the hook's scope is cancelled and the task is left to
	/// finish in the background; its late result is only logged.
	pub(super) async fn run_hook(self: &Arc<Self>, kind: HookKind) -> Result<()> {
		let hook = self.definition.hook(kind);
		let lifecycle = self.definition.behavior().lifecycle();
		if hook.is_none() && lifecycle.is_none() {
			return Ok(());
		}

		let timeout = kind.timeout(&self.settings);
		let scope = Scope::new().with_timeout(timeout);
		let ctx = Context::new(Arc::clone(self), scope.clone());
		tracing::trace!(actor = %self.path, hook = kind.as_str(), "actor.hook.start");

		let mut task = spawn(TaskKind::Hook, async move {
			if let Some(hook) = hook {
				hook(ctx.clone()).await?;
			}
			if let Some(lifecycle) = lifecycle {
				run_lifecycle(lifecycle.as_ref(), kind, &ctx).await?;
			}
			Ok::<(), ActorError>(())
		});

		let failure = |message: String| ActorError::LifecycleHook {
			path: self.path.clone(),
			hook: kind,
			message,
		};
		match tokio::time::timeout(timeout, &mut task).await {
			Ok(Ok(Ok(()))) => Ok(()),
			Ok(Ok(Err(err))) => Err(failure(err.to_string())),
			Ok(Err(join)) => {
				let reason = join_error_panic_message(join).map_or_else(|| "hook task cancelled".to_string(), |msg| format!("panicked: {msg}"));
				Err(failure(reason))
			}
			Err(_) => {
				scope.cancel();
				let path = self.path.clone();
				spawn(TaskKind::Hook, async move {
					if let Ok(Err(err)) = task.await {
						tracing::debug!(actor = %path, hook = kind.as_str(), error = %err, "actor.hook.late_failure");
					}
				});
				Err(failure(format!("timed out after {timeout:?}")))
			}
		}
	}
}
