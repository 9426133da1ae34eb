use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Mailbox send error. Hands the rejected item back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MailboxSendError<T> {
	/// Mailbox is closed.
	Closed(T),
	/// Queue is full and non-blocking send was used.
	Full(T),
}

impl<T> MailboxSendError<T> {
	pub(crate) fn into_inner(self) -> T {
		match self {
			Self::Closed(item) | Self::Full(item) => item,
		}
	}
}

struct MailboxState<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct MailboxInner<T> {
	capacity: usize,
	state: Mutex<MailboxState<T>>,
	notify_recv: Notify,
	notify_send: Notify,
}

/// Multi-producer handle to a bounded FIFO mailbox.
pub(crate) struct MailboxSender<T> {
	inner: Arc<MailboxInner<T>>,
}

/// The single consumer end of a mailbox.
pub(crate) struct MailboxReceiver<T> {
	inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

/// Creates a bounded backpressure mailbox.
///
/// Senders wait while the queue holds `capacity` items. Closing wakes every
/// waiter and makes further sends fail with `Closed`.
pub(crate) fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
	let capacity = capacity.max(1);
	let inner = Arc::new(MailboxInner {
		capacity,
		state: Mutex::new(MailboxState {
			queue: VecDeque::with_capacity(capacity.min(1024)),
			closed: false,
		}),
		notify_recv: Notify::new(),
		notify_send: Notify::new(),
	});
	(
		MailboxSender {
			inner: Arc::clone(&inner),
		},
		MailboxReceiver { inner },
	)
}

impl<T> MailboxSender<T> {
	/// Enqueues, waiting for capacity while the queue is full.
	pub(crate) async fn send(&self, msg: T) -> Result<(), MailboxSendError<T>> {
		let mut msg = msg;
		loop {
			// Register the notification future *before* checking capacity
			// to avoid lost-wakeup between unlock and await.
			let notified = self.inner.notify_send.notified();

			match self.try_send(msg) {
				Err(MailboxSendError::Full(rejected)) => msg = rejected,
				outcome => return outcome,
			}
			notified.await;
		}
	}

	/// Non-blocking enqueue.
	pub(crate) fn try_send(&self, msg: T) -> Result<(), MailboxSendError<T>> {
		let mut state = self.inner.state.lock();
		if state.closed {
			return Err(MailboxSendError::Closed(msg));
		}
		if state.queue.len() >= self.inner.capacity {
			return Err(MailboxSendError::Full(msg));
		}
		state.queue.push_back(msg);
		drop(state);
		self.inner.notify_recv.notify_one();
		Ok(())
	}

	/// Returns current queue length.
	pub(crate) fn len(&self) -> usize {
		self.inner.state.lock().queue.len()
	}

	/// Returns queue capacity.
	pub(crate) fn capacity(&self) -> usize {
		self.inner.capacity
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	pub(crate) fn same_mailbox(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives one message. Returns `None` once the mailbox is closed and drained.
	pub(crate) async fn recv(&mut self) -> Option<T> {
		loop {
			let notified = self.inner.notify_recv.notified();
			{
				let mut state = self.inner.state.lock();
				if let Some(msg) = state.queue.pop_front() {
					drop(state);
					self.inner.notify_send.notify_one();
					return Some(msg);
				}
				if state.closed {
					return None;
				}
			}
			notified.await;
		}
	}

	/// Closes the mailbox and returns whatever was still queued.
	///
	/// Blocked senders wake up and fail with `Closed`.
	pub(crate) fn close_and_drain(&mut self) -> Vec<T> {
		let mut state = self.inner.state.lock();
		state.closed = true;
		let leftovers = state.queue.drain(..).collect();
		drop(state);
		self.inner.notify_recv.notify_waiters();
		self.inner.notify_send.notify_waiters();
		leftovers
	}
}
