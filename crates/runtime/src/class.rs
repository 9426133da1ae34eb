/// Kinds of tasks the runtime spawns, recorded on every spawn for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskKind {
	/// The single consumer loop of one actor.
	MessageLoop,
	/// One behavior invocation.
	Dispatch,
	/// A lifecycle hook running under its timeout.
	Hook,
	/// Timer and ticker drivers.
	Timer,
	/// Upward notifications and other detached sends.
	Notify,
	/// OS signal listeners.
	Signal,
}

impl TaskKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::MessageLoop => "message_loop",
			Self::Dispatch => "dispatch",
			Self::Hook => "hook",
			Self::Timer => "timer",
			Self::Notify => "notify",
			Self::Signal => "signal",
		}
	}
}
