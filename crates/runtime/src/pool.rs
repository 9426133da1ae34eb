use std::sync::Arc;

use crate::context::Context;
use crate::definition::Definition;
use crate::dispatch::Behavior;
use crate::error::ActorError;
use crate::message::{Message, Reply};

/// A router actor with `size` workers named `{name}-{i}`, built from
/// `factory(i)`.
///
/// Every message is forwarded, reply slot included, to the live worker with
/// the shortest queue; ties go to the earliest worker. Workers are created
/// before the router accepts its first message.
pub fn pool<F>(name: impl Into<String>, size: usize, factory: F) -> Definition
where
	F: Fn(usize) -> Definition + Send + Sync + 'static,
{
	let name = name.into();
	let factory = Arc::new(factory);
	let prefix = name.clone();
	Definition::new(name, Behavior::new().on_message(route)).pre_start(move |ctx: Context| {
		let factory = Arc::clone(&factory);
		let prefix = prefix.clone();
		async move {
			for index in 0..size {
				ctx.spawn(factory(index).named(format!("{prefix}-{index}")))?;
			}
			tracing::debug!(actor = %ctx.path(), size, "pool.ready");
			Ok::<(), ActorError>(())
		}
	})
}

async fn route(ctx: Context, mut message: Message) {
	let worker = ctx.children().into_iter().filter(|worker| !worker.is_closed()).min_by_key(|worker| worker.len());
	match worker {
		Some(worker) => {
			if let Err(err) = worker.forward(message).await {
				tracing::trace!(actor = %ctx.path(), worker = %worker.path(), error = %err, "pool.forward_failed");
			}
		}
		None => {
			message.reply(Reply::Error(ActorError::NotFound(format!("{} has no workers", ctx.path()))));
		}
	}
}
