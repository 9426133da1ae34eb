use std::any::{Any, TypeId};
use std::fmt;

use crate::error::ActorError;
use crate::message::{Payload, Reply};

/// What a handler declares it returns, in dispatch preference order.
///
/// When several handlers accept the same payload, the one whose return shape
/// sorts first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Returns {
	/// `Result<R, E>` with a non-unit `R`, or a raw [`Reply`].
	ResultError,
	/// `Result<(), E>`.
	Error,
	/// A plain value.
	Result,
	/// `()`.
	Nothing,
}

/// Conversion of handler return values into a [`Reply`].
pub trait IntoReply: Send + 'static {
	fn returns() -> Returns;
	fn into_reply(self) -> Reply;
}

impl IntoReply for () {
	fn returns() -> Returns {
		Returns::Nothing
	}

	fn into_reply(self) -> Reply {
		Reply::Done
	}
}

impl IntoReply for Reply {
	fn returns() -> Returns {
		Returns::ResultError
	}

	fn into_reply(self) -> Reply {
		self
	}
}

impl<R, E> IntoReply for Result<R, E>
where
	R: Send + 'static,
	E: fmt::Display + Send + 'static,
{
	fn returns() -> Returns {
		if TypeId::of::<R>() == TypeId::of::<()>() {
			Returns::Error
		} else {
			Returns::ResultError
		}
	}

	fn into_reply(self) -> Reply {
		match self {
			Ok(value) => {
				let payload = Payload::new(value);
				if payload.is::<()>() { Reply::Done } else { Reply::Value(payload) }
			}
			Err(err) => Reply::Error(into_actor_error(err)),
		}
	}
}

/// Marks an arbitrary value as a handler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value<T>(pub T);

impl<T: Send + 'static> IntoReply for Value<T> {
	fn returns() -> Returns {
		Returns::Result
	}

	fn into_reply(self) -> Reply {
		Reply::value(self.0)
	}
}

macro_rules! value_replies {
	($($ty:ty),* $(,)?) => {
		$(
			impl IntoReply for $ty {
				fn returns() -> Returns {
					Returns::Result
				}

				fn into_reply(self) -> Reply {
					Reply::value(self)
				}
			}
		)*
	};
}

value_replies!(bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, String, &'static str);

impl<T: Send + 'static> IntoReply for Vec<T> {
	fn returns() -> Returns {
		Returns::Result
	}

	fn into_reply(self) -> Reply {
		Reply::value(self)
	}
}

impl<T: Send + 'static> IntoReply for Option<T> {
	fn returns() -> Returns {
		Returns::Result
	}

	fn into_reply(self) -> Reply {
		Reply::value(self)
	}
}

/// Keeps runtime errors intact and stringifies everything else.
pub(crate) fn into_actor_error<E: fmt::Display + 'static>(err: E) -> ActorError {
	let any: &dyn Any = &err;
	match any.downcast_ref::<ActorError>() {
		Some(actor_err) => actor_err.clone(),
		None => ActorError::Handler(err.to_string()),
	}
}
