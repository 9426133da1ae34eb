//! One-shot timers and periodic tickers driven by spawned tasks.
//!
//! Both stop when their handle is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::class::TaskKind;
use crate::spawn::spawn;

/// Fires a callback once after a delay. Can be re-armed with [`reset`](Self::reset).
#[derive(Debug)]
pub struct Timer {
	cancel: CancellationToken,
	deadline: watch::Sender<Instant>,
}

impl Timer {
	pub(crate) fn start<F, Fut>(delay: Duration, mut fire: F) -> Self
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let cancel = CancellationToken::new();
		let (deadline, mut rx) = watch::channel(Instant::now() + delay);
		let token = cancel.clone();
		spawn(TaskKind::Timer, async move {
			let mut armed = Some(*rx.borrow_and_update());
			loop {
				match armed {
					Some(at) => {
						tokio::select! {
							biased;
							() = token.cancelled() => return,
							changed = rx.changed() => {
								if changed.is_err() {
									return;
								}
								armed = Some(*rx.borrow_and_update());
							}
							() = tokio::time::sleep_until(at) => {
								fire().await;
								armed = None;
							}
						}
					}
					None => {
						tokio::select! {
							biased;
							() = token.cancelled() => return,
							changed = rx.changed() => {
								if changed.is_err() {
									return;
								}
								armed = Some(*rx.borrow_and_update());
							}
						}
					}
				}
			}
		});
		Self { cancel, deadline }
	}

	/// Re-arms the timer to fire `delay` from now, whether or not it already fired.
	pub fn reset(&self, delay: Duration) {
		self.deadline.send_replace(Instant::now() + delay);
	}

	pub fn stop(&self) {
		self.cancel.cancel();
	}

	pub fn is_stopped(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

impl Drop for Timer {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

/// Fires a callback every period until stopped.
#[derive(Debug)]
pub struct Ticker {
	cancel: CancellationToken,
	period: watch::Sender<Duration>,
}

impl Ticker {
	pub(crate) fn start<F, Fut>(period: Duration, tick: F) -> Self
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		Self::start_with(CancellationToken::new(), period, tick)
	}

	/// Like [`start`](Self::start) but stopped through a caller-held token too.
	pub(crate) fn start_with<F, Fut>(cancel: CancellationToken, period: Duration, mut tick: F) -> Self
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let period = period.max(Duration::from_millis(1));
		let (period_tx, mut rx) = watch::channel(period);
		let token = cancel.clone();
		spawn(TaskKind::Timer, async move {
			let mut every = *rx.borrow_and_update();
			let mut next = Instant::now() + every;
			loop {
				tokio::select! {
					biased;
					() = token.cancelled() => return,
					changed = rx.changed() => {
						if changed.is_err() {
							return;
						}
						every = *rx.borrow_and_update();
						next = Instant::now() + every;
					}
					() = tokio::time::sleep_until(next) => {
						tick().await;
						next += every;
						let now = Instant::now();
						while next <= now {
							next += every;
						}
					}
				}
			}
		});
		Self { cancel, period: period_tx }
	}

	/// Changes the period; the next tick is one new period from now.
	pub fn reset(&self, period: Duration) {
		self.period.send_replace(period.max(Duration::from_millis(1)));
	}

	pub fn stop(&self) {
		self.cancel.cancel();
	}

	pub fn is_stopped(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

impl Drop for Ticker {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<()> + Send + 'static) {
		let count = Arc::new(AtomicUsize::new(0));
		let hits = Arc::clone(&count);
		(count, move || {
			hits.fetch_add(1, Ordering::SeqCst);
			std::future::ready(())
		})
	}

	#[tokio::test(start_paused = true)]
	async fn timer_fires_once() {
		let (count, fire) = counter();
		let _timer = Timer::start(Duration::from_millis(100), fire);

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(count.load(Ordering::SeqCst), 0);
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn timer_reset_postpones_and_rearms() {
		let (count, fire) = counter();
		let timer = Timer::start(Duration::from_millis(100), fire);

		tokio::time::sleep(Duration::from_millis(80)).await;
		timer.reset(Duration::from_millis(100));
		tokio::time::sleep(Duration::from_millis(80)).await;
		assert_eq!(count.load(Ordering::SeqCst), 0);
		tokio::time::sleep(Duration::from_millis(40)).await;
		assert_eq!(count.load(Ordering::SeqCst), 1);

		timer.reset(Duration::from_millis(10));
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(count.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn stopped_timer_never_fires() {
		let (count, fire) = counter();
		let timer = Timer::start(Duration::from_millis(100), fire);
		timer.stop();
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(count.load(Ordering::SeqCst), 0);
		assert!(timer.is_stopped());
	}

	#[tokio::test(start_paused = true)]
	async fn ticker_fires_every_period_until_dropped() {
		let (count, tick) = counter();
		let ticker = Ticker::start(Duration::from_millis(100), tick);

		tokio::time::sleep(Duration::from_millis(350)).await;
		assert_eq!(count.load(Ordering::SeqCst), 3);

		drop(ticker);
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(count.load(Ordering::SeqCst), 3);
	}
}
