//! Streaming bodies that run inside their request's context
//!
//! A body produced lazily after the view has returned still needs the
//! request and application contexts. [`ContextStream`] holds a lease on its
//! [`RequestContext`]; while any lease is outstanding the dispatcher does not
//! pop the request at the end of dispatch. Instead it moves the request's
//! frames off the task's stack and parks them here, and the last lease to be
//! released (stream exhausted or dropped) pops them.

use crate::ctx::RequestContext;
use crate::stack::{self, ContextStack, Frame};
use carafe_http::ContractViolation;
use futures::Stream;
use pin_project::{pin_project, pinned_drop};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

#[derive(Default)]
pub(crate) struct StreamState {
	leases: usize,
	dispatch_finished: bool,
	detached: Option<ContextStack>,
}

/// A stream polled inside the context of the request that created it.
#[pin_project(PinnedDrop)]
pub struct ContextStream<S> {
	#[pin]
	inner: S,
	ctx: Arc<RequestContext>,
	released: bool,
}

impl<S> ContextStream<S> {
	pub(crate) fn new(ctx: Arc<RequestContext>, inner: S) -> Self {
		ctx.streaming.lock().leases += 1;
		Self {
			inner,
			ctx,
			released: false,
		}
	}

	pub fn request_context(&self) -> &Arc<RequestContext> {
		&self.ctx
	}
}

impl<S: Stream> Stream for ContextStream<S> {
	type Item = S::Item;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();
		if *this.released {
			return Poll::Ready(None);
		}

		let detached = this.ctx.streaming.lock().detached.clone();
		let poll = match detached {
			Some(frames) => stack::sync_scope(frames, || this.inner.as_mut().poll_next(cx)),
			None => this.inner.as_mut().poll_next(cx),
		};

		if let Poll::Ready(None) = poll {
			*this.released = true;
			release(this.ctx);
		}
		poll
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}

#[pinned_drop]
impl<S> PinnedDrop for ContextStream<S> {
	fn drop(self: Pin<&mut Self>) {
		let this = self.project();
		if !*this.released {
			*this.released = true;
			release(this.ctx);
		}
	}
}

fn release(ctx: &Arc<RequestContext>) {
	let detached = {
		let mut state = ctx.streaming.lock();
		state.leases = state.leases.saturating_sub(1);
		if state.leases == 0 && state.dispatch_finished {
			state.detached.take()
		} else {
			None
		}
	};

	if let Some(frames) = detached {
		tracing::debug!(ctx = ?ctx, "stream finished; tearing down request");
		if let Err(violation) = stack::sync_scope(frames, || ctx.pop(None)) {
			tracing::error!(error = %violation, "failed to tear down streamed request");
		}
	}
}

/// Move the request's frames off the task's stack so teardown can run when
/// the last stream lease is released.
///
/// An application context the request reused from an outer push is released
/// right away, so its owner's pop stays balanced; the detached frames keep
/// a reference to it for the body.
///
/// Returns `false` without touching the stack if no lease is outstanding;
/// the caller then pops the request itself.
pub(crate) fn detach(ctx: &Arc<RequestContext>) -> Result<bool, ContractViolation> {
	let mut state = ctx.streaming.lock();
	if state.leases == 0 {
		return Ok(false);
	}

	let mut frames = ContextStack::new();
	let request_frame = Frame::Request(ctx.clone());
	stack::pop(&request_frame)?;
	if let Some(app_ctx) = ctx.app_context() {
		let app_frame = Frame::App(app_ctx.clone());
		if ctx.created_app_context() {
			stack::pop(&app_frame)?;
		} else {
			// the frame stays with its owner; the body only borrows it
			ctx.release_app_context()?;
		}
		frames.push(app_frame);
	}
	frames.push(request_frame);

	state.detached = Some(frames);
	state.dispatch_finished = true;
	Ok(true)
}
