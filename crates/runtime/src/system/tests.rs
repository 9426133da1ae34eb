use std::sync::Arc;
use std::time::Duration;

use clove_config::{ActorOverrides, Settings};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use super::*;
use crate::logger::{LogLevel, LogRecord};
use crate::pool::pool;
use crate::pubsub::SubscriptionCount;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
struct Snapshot;

#[derive(Debug, Clone)]
struct Resolve(&'static str);

#[derive(Debug, Clone, Copy)]
struct Whoami;

/// Actor that keeps every `T` it receives and answers `Snapshot` with them.
fn collector<T: Clone + Send + Sync + 'static>(name: &str) -> Definition {
	let seen: Arc<Mutex<Vec<T>>> = Arc::default();
	let snapshot = Arc::clone(&seen);
	let behavior = Behavior::new()
		.on(move |value: T| {
			let seen = Arc::clone(&seen);
			async move { seen.lock().push(value) }
		})
		.on(move |_: Snapshot| {
			let snapshot = Arc::clone(&snapshot);
			async move { snapshot.lock().clone() }
		});
	Definition::new(name, behavior)
}

/// Answers `Resolve` with the path found relative to itself.
fn resolver(name: &str) -> Definition {
	let behavior = Behavior::from_fn(|ctx: Context, Resolve(target): Resolve| async move {
		ctx.at(target).map(|found| found.path().to_string())
	});
	Definition::new(name, behavior)
}

/// Waits until every broadcast published so far has been fanned out.
async fn flush_pubsub(system: &System) {
	system.at(PUBSUB_PATH).unwrap().ask::<usize>(SubscriptionCount, WAIT).await.unwrap();
}

#[tokio::test]
async fn fixed_tree_is_in_place() {
	let system = System::new("tree").unwrap();
	assert_eq!(system.root().unwrap().path(), "/");
	for path in [USR_PATH, SRV_PATH, CORE_PATH, PUBSUB_PATH, LOGGER_PATH] {
		assert_eq!(system.at(path).unwrap().path(), path);
	}
	let err = system.root().unwrap().ask::<()>(1u32, WAIT).await.unwrap_err();
	assert!(matches!(err, ActorError::Unsupported(_)), "got {err:?}");
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn relative_paths_resolve_from_the_actor() {
	let system = System::new("paths").unwrap();
	let actor = system
		.spawn(resolver("a").pre_start(|ctx: Context| async move { ctx.spawn(resolver("b")).map(|_| ()) }))
		.unwrap();

	let cases = [
		(".", "/usr/a"),
		("a", "/usr/a"),
		("b", "/usr/a/b"),
		("a/b", "/usr/a/b"),
		("..", "/usr"),
		("../..", "/"),
		("/", "/"),
		("../a/b", "/usr/a/b"),
		("/core/pubsub", "/core/pubsub"),
	];
	for (target, expected) in cases {
		let found: String = actor.ask(Resolve(target), WAIT).await.unwrap();
		assert_eq!(found, expected, "resolving {target:?}");
	}

	for target in ["missing", "", "b/missing"] {
		let err = actor.ask::<String>(Resolve(target), WAIT).await.unwrap_err();
		assert_eq!(err, ActorError::NotFound(target.to_string()));
	}
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn child_named_like_its_parent_resolves_by_path() {
	let system = System::new("paths").unwrap();
	let actor = system
		.spawn(resolver("a").pre_start(|ctx: Context| async move { ctx.spawn(resolver("a")).map(|_| ()) }))
		.unwrap();
	// Answered once pre_start has spawned the child.
	actor.ask::<String>(Resolve("."), WAIT).await.unwrap();

	assert_eq!(system.at("/usr/a/a").unwrap().path(), "/usr/a/a");
	assert_eq!(system.at("/usr/a/a/").unwrap().path(), "/usr/a/a");
	let cases = [("a", "/usr/a"), ("a/a", "/usr/a/a"), ("./a", "/usr/a/a"), ("a/a/..", "/usr/a")];
	for (target, expected) in cases {
		let found: String = actor.ask(Resolve(target), WAIT).await.unwrap();
		assert_eq!(found, expected, "resolving {target:?}");
	}
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn empty_segments_do_not_resolve() {
	let system = System::new("paths").unwrap();
	system.spawn(collector::<u32>("x")).unwrap();

	for path in ["/usr//x", "usr//x", "/usr/x//"] {
		assert_eq!(system.at(path).unwrap_err(), ActorError::NotFound(path.to_string()));
	}
	assert_eq!(system.at("/usr/x").unwrap().path(), "/usr/x");
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
	let system = System::new("dups").unwrap();
	system.spawn(collector::<u32>("dup")).unwrap();
	let err = system.spawn(collector::<u32>("dup")).unwrap_err();
	assert_eq!(
		err,
		ActorError::DuplicateChild {
			parent: "/usr".to_string(),
			name: "dup".to_string(),
		}
	);

	let anonymous = system.spawn(collector::<u32>("")).unwrap();
	assert!(anonymous.name().starts_with('$'), "got {}", anonymous.name());
	assert_eq!(anonymous.path(), format!("/usr/{}", anonymous.name()));
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn capacity_comes_from_path_settings() {
	let settings = Settings::default()
		.with_override(
			"/usr/small",
			ActorOverrides {
				queue_capacity: Some(3),
				..Default::default()
			},
		)
		.unwrap();
	let system = System::with_settings("settings", settings).unwrap();

	assert_eq!(system.spawn(collector::<u32>("small")).unwrap().capacity(), 3);
	assert_eq!(system.spawn(collector::<u32>("big")).unwrap().capacity(), 1000);
	assert_eq!(system.spawn(collector::<u32>("explicit").queue_capacity(7)).unwrap().capacity(), 7);
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn publish_honours_filters_and_replacement() {
	let system = System::new("pubsub").unwrap();
	let subscriber = system.spawn(collector::<u32>("evens")).unwrap();

	system.subscribe(&subscriber, Filter::when::<u32>(|n| n % 2 == 0)).await.unwrap();
	for n in 1..=4u32 {
		system.publish(n).await.unwrap();
	}
	system.publish("not a number").await.unwrap();
	flush_pubsub(&system).await;
	assert_eq!(subscriber.ask::<Vec<u32>>(Snapshot, WAIT).await.unwrap(), vec![2, 4]);

	// Subscribing again replaces the filter instead of adding a second entry.
	system.subscribe(&subscriber, Filter::of::<u32>()).await.unwrap();
	system.subscribe(&subscriber, Filter::of::<u32>()).await.unwrap();
	system.publish(5u32).await.unwrap();
	flush_pubsub(&system).await;
	assert_eq!(subscriber.ask::<Vec<u32>>(Snapshot, WAIT).await.unwrap(), vec![2, 4, 5]);

	system.unsubscribe(&subscriber).await.unwrap();
	system.publish(6u32).await.unwrap();
	flush_pubsub(&system).await;
	assert_eq!(subscriber.ask::<Vec<u32>>(Snapshot, WAIT).await.unwrap(), vec![2, 4, 5]);
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn context_logging_is_published() {
	let system = System::new("logs").unwrap();
	let logs = system.spawn(collector::<LogRecord>("logs")).unwrap();
	system.subscribe(&logs, Filter::of::<LogRecord>()).await.unwrap();

	let chatty = Behavior::from_fn(|ctx: Context, _: Whoami| async move { ctx.warn("disk almost full") });
	let chatty = system.spawn(Definition::new("chatty", chatty)).unwrap();
	chatty.ask::<()>(Whoami, WAIT).await.unwrap();
	flush_pubsub(&system).await;

	let records: Vec<LogRecord> = logs.ask(Snapshot, WAIT).await.unwrap();
	assert_eq!(
		records,
		vec![LogRecord {
			level: LogLevel::Warn,
			path: "/usr/chatty".to_string(),
			message: "disk almost full".to_string(),
		}]
	);
	system.terminate().await.unwrap();
}

struct Echo;

impl Service for Echo {
	fn definition(&self) -> Definition {
		Definition::new("echo", Behavior::from_fn(|text: String| async move { text }))
	}
}

#[tokio::test]
async fn services_live_under_srv() {
	let system = System::new("services").unwrap();
	let echo = system.spawn_service(&Echo).unwrap();
	assert_eq!(echo.path(), "/srv/echo");
	assert_eq!(echo.ask::<String>("hi".to_string(), WAIT).await.unwrap(), "hi");
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn pool_routes_to_workers() {
	let system = System::new("pool").unwrap();
	let workers = system
		.spawn(pool("workers", 3, |_| {
			Definition::new("", Behavior::from_fn(|ctx: Context, _: Whoami| async move { ctx.name().to_string() }))
		}))
		.unwrap();

	let name: String = workers.ask(Whoami, WAIT).await.unwrap();
	assert!(["workers-0", "workers-1", "workers-2"].contains(&name.as_str()), "got {name}");
	for index in 0..3 {
		system.at(&format!("/usr/workers/workers-{index}")).unwrap();
	}
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn terminate_stops_children_before_parents() {
	let system = System::new("shutdown").unwrap();
	let events: Arc<Mutex<Vec<String>>> = Arc::default();

	let worker_events = Arc::clone(&events);
	let pool_events = Arc::clone(&events);
	let workers = pool("workers", 3, move |index| {
		let events = Arc::clone(&worker_events);
		Definition::new("", Behavior::from_fn(|_: Whoami| async {})).post_stop(move || {
			let events = Arc::clone(&events);
			async move { events.lock().push(format!("workers-{index}")) }
		})
	})
	.post_stop(move || {
		let events = Arc::clone(&pool_events);
		async move { events.lock().push("workers".to_string()) }
	});
	let workers = system.spawn(workers).unwrap();
	// Answered only once the workers exist.
	workers.ask::<()>(Whoami, WAIT).await.unwrap();

	system.terminate().await.unwrap();
	tokio::time::timeout(WAIT, system.terminated()).await.unwrap();

	assert!(system.is_terminated());
	assert_eq!(*events.lock(), vec!["workers-0", "workers-1", "workers-2", "workers"]);
	assert_eq!(system.spawn(collector::<u32>("late")).unwrap_err(), ActorError::Terminated);
	assert_eq!(system.root().unwrap_err(), ActorError::Terminated);
	// Terminating again is a no-op.
	system.terminate().await.unwrap();
}

#[tokio::test]
async fn timer_fires_through_the_system() {
	let system = System::new("timers").unwrap();
	let fired = Arc::new(Notify::new());
	let signal = Arc::clone(&fired);
	let _timer = system.timer(Duration::from_millis(10), move || {
		let signal = Arc::clone(&signal);
		async move { signal.notify_one() }
	});

	tokio::time::timeout(WAIT, fired.notified()).await.unwrap();
	system.terminate().await.unwrap();
}
