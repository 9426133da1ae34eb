use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::definition::Definition;
use crate::error::Result;
use crate::system::System;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct Ping(u32);

#[test]
fn context_handlers_rank_first() {
	let behavior = Behavior::new()
		.on(|ping: Ping| async move { ping.0 })
		.on(|_ctx: Context, ping: Ping| async move { ping.0 + 1 });

	let shapes = behavior.shapes::<Ping>();
	assert_eq!(shapes.len(), 2);
	assert!(shapes[0].context);
	assert!(!shapes[1].context);
}

#[test]
fn return_shapes_follow_preference_order() {
	let behavior = Behavior::new()
		.on(|_: Ping| async move {})
		.on(|ping: Ping| async move { ping.0 })
		.on(|_: Ping| async move { Ok::<(), ActorError>(()) })
		.on(|ping: Ping| async move { Ok::<_, ActorError>(ping.0) });

	let returns: Vec<Returns> = behavior.shapes::<Ping>().into_iter().map(|shape| shape.returns).collect();
	assert_eq!(returns, vec![Returns::ResultError, Returns::Error, Returns::Result, Returns::Nothing]);
}

#[test]
fn handles_reports_typed_handlers_only() {
	let behavior = Behavior::new().on(|ping: Ping| async move { ping.0 }).on_any(|| async {});
	assert!(behavior.handles::<Ping>());
	assert!(!behavior.handles::<String>());
	assert!(!behavior.is_empty());
	assert!(Behavior::new().is_empty());
}

#[tokio::test]
async fn preferred_handler_answers() {
	let system = System::new("dispatch").unwrap();
	let behavior = Behavior::new()
		.on(|ping: Ping| async move { ping.0.to_string() })
		.on(|ctx: Context, ping: Ping| async move { format!("{}:{}", ctx.name(), ping.0) });
	let actor = system.spawn(Definition::new("pref", behavior)).unwrap();

	let reply: String = actor.ask(Ping(7), WAIT).await.unwrap();
	assert_eq!(reply, "pref:7");
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn unmatched_payload_is_no_handler() {
	let system = System::new("dispatch").unwrap();
	let actor = system
		.spawn(Definition::new("strict", Behavior::from_fn(|ping: Ping| async move { ping.0 })))
		.unwrap();

	let err = actor.ask::<u32>("nope", WAIT).await.unwrap_err();
	assert_eq!(err, ActorError::NoHandler(std::any::type_name::<&str>()));
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn fallback_catches_other_payloads() {
	let system = System::new("dispatch").unwrap();
	let behavior = Behavior::new()
		.on(|ping: Ping| async move { ping.0 })
		.on_any(|| async { "fallback" });
	let actor = system.spawn(Definition::new("lenient", behavior)).unwrap();

	assert_eq!(actor.ask::<u32>(Ping(3), WAIT).await.unwrap(), 3);
	assert_eq!(actor.ask::<&str>(42u8, WAIT).await.unwrap(), "fallback");
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn unit_and_errors_map_to_sentinels() {
	let system = System::new("dispatch").unwrap();
	let behavior = Behavior::new()
		.on(|_: Ping| async {})
		.on(|text: String| async move { Err::<u32, _>(format!("bad input: {text}")) });
	let actor = system.spawn(Definition::new("sentinels", behavior)).unwrap();

	let reply = actor.ask_reply(Ping(1), WAIT).await.unwrap();
	assert!(matches!(reply, Reply::Done), "got {reply:?}");

	let err = actor.ask::<u32>("x".to_string(), WAIT).await.unwrap_err();
	assert_eq!(err, ActorError::Handler("bad input: x".to_string()));
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn message_handler_owns_the_reply_slot() {
	let system = System::new("dispatch").unwrap();
	let behavior = Behavior::new().on_message(|_ctx: Context, mut message: Message| async move {
		let name = message.payload().type_name();
		message.reply(Reply::value(name));
	});
	let actor = system.spawn(Definition::new("raw", behavior)).unwrap();

	let name: &str = actor.ask(Ping(1), WAIT).await.unwrap();
	assert_eq!(name, std::any::type_name::<Ping>());
	system.terminate().await.unwrap();
}

#[derive(Default)]
struct Counter {
	total: AtomicU64,
	started: AtomicBool,
}

impl Counter {
	async fn add(self: Arc<Self>, n: u64) -> u64 {
		self.total.fetch_add(n, Ordering::SeqCst) + n
	}
}

#[async_trait::async_trait]
impl Lifecycle for Counter {
	async fn pre_start(&self, _ctx: &Context) -> Result<()> {
		self.started.store(true, Ordering::SeqCst);
		Ok(())
	}
}

#[tokio::test]
async fn capabilities_share_state_and_lifecycle() {
	let system = System::new("dispatch").unwrap();
	let counter = Arc::new(Counter::default());
	let behavior = Behavior::with_state(Arc::clone(&counter)).on(Counter::add).lifecycle();
	let actor = system.spawn(Definition::new("counter", behavior)).unwrap();

	assert_eq!(actor.ask::<u64>(2u64, WAIT).await.unwrap(), 2);
	assert_eq!(actor.ask::<u64>(3u64, WAIT).await.unwrap(), 5);
	assert!(counter.started.load(Ordering::SeqCst));
	system.terminate().await.unwrap();
}
