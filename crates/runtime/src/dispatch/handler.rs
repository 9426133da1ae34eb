//! Accepted handler shapes.
//!
//! Each trait is implemented for plain closures and `async fn` items; the
//! marker type parameter only disambiguates which shape matched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::reply::IntoReply;
use crate::context::Context;

/// Boxed `Send` future used at type-erased boundaries.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Shape marker: `Fn(T)`.
#[derive(Debug)]
pub struct PayloadOnly;

/// Shape marker: `Fn(Context, T)`.
#[derive(Debug)]
pub struct WithContext;

/// Shape marker: `Fn()`.
#[derive(Debug)]
pub struct NoArgs;

/// Shape marker: `Fn(Context)`.
#[derive(Debug)]
pub struct ContextOnly;

/// A handler for payloads of type `T`.
pub trait Handler<T, M>: Send + Sync + 'static {
	type Output: IntoReply;
	const CONTEXT: bool;

	fn call(&self, ctx: Context, payload: T) -> BoxFuture<Self::Output>;
}

impl<F, Fut, T> Handler<T, PayloadOnly> for F
where
	F: Fn(T) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
	T: Send + 'static,
{
	type Output = Fut::Output;
	const CONTEXT: bool = false;

	fn call(&self, _ctx: Context, payload: T) -> BoxFuture<Self::Output> {
		Box::pin(self(payload))
	}
}

impl<F, Fut, T> Handler<T, WithContext> for F
where
	F: Fn(Context, T) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
	T: Send + 'static,
{
	type Output = Fut::Output;
	const CONTEXT: bool = true;

	fn call(&self, ctx: Context, payload: T) -> BoxFuture<Self::Output> {
		Box::pin(self(ctx, payload))
	}
}

/// A payload-less fallback handler.
pub trait Callback<M>: Send + Sync + 'static {
	type Output: IntoReply;
	const CONTEXT: bool;

	fn call(&self, ctx: Context) -> BoxFuture<Self::Output>;
}

impl<F, Fut> Callback<NoArgs> for F
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
{
	type Output = Fut::Output;
	const CONTEXT: bool = false;

	fn call(&self, _ctx: Context) -> BoxFuture<Self::Output> {
		Box::pin(self())
	}
}

impl<F, Fut> Callback<ContextOnly> for F
where
	F: Fn(Context) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
{
	type Output = Fut::Output;
	const CONTEXT: bool = true;

	fn call(&self, ctx: Context) -> BoxFuture<Self::Output> {
		Box::pin(self(ctx))
	}
}

/// A handler bound to shared actor state, e.g. `async fn on_add(self: Arc<Self>, add: Add)`.
pub trait Method<S, T, M>: Send + Sync + 'static {
	type Output: IntoReply;
	const CONTEXT: bool;

	fn call(&self, state: Arc<S>, ctx: Context, payload: T) -> BoxFuture<Self::Output>;
}

impl<F, Fut, S, T> Method<S, T, PayloadOnly> for F
where
	F: Fn(Arc<S>, T) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
	S: Send + Sync + 'static,
	T: Send + 'static,
{
	type Output = Fut::Output;
	const CONTEXT: bool = false;

	fn call(&self, state: Arc<S>, _ctx: Context, payload: T) -> BoxFuture<Self::Output> {
		Box::pin(self(state, payload))
	}
}

impl<F, Fut, S, T> Method<S, T, WithContext> for F
where
	F: Fn(Arc<S>, Context, T) -> Fut + Send + Sync + 'static,
	Fut: Future + Send + 'static,
	Fut::Output: IntoReply,
	S: Send + Sync + 'static,
	T: Send + 'static,
{
	type Output = Fut::Output;
	const CONTEXT: bool = true;

	fn call(&self, state: Arc<S>, ctx: Context, payload: T) -> BoxFuture<Self::Output> {
		Box::pin(self(state, ctx, payload))
	}
}
