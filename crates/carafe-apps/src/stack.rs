//! Task-local context stack
//!
//! Each request runs inside its own stack of application and request
//! contexts, stored in a tokio task-local so it follows the task across
//! worker threads and is never visible to other tasks.
//!
//! ## Rules
//!
//! - Pops are LIFO and identity-checked. Popping anything but the top frame
//!   is a [`ContractViolation`] and leaves the stack untouched.
//! - The `RefCell` borrow is never held while user code runs; hooks may
//!   freely read the stack through the accessors in [`crate::globals`].

use crate::ctx::{AppContext, RequestContext};
use carafe_http::ContractViolation;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
	/// Task-local context stack. Follows the task across thread boundaries in
	/// work-stealing runtimes.
	static CONTEXT_STACK: RefCell<ContextStack>;
}

/// One entry of the context stack.
#[derive(Clone)]
pub enum Frame {
	App(Arc<AppContext>),
	Request(Arc<RequestContext>),
}

impl Frame {
	/// Identity comparison; two frames are the same only if they wrap the
	/// same context object.
	pub fn is(&self, other: &Frame) -> bool {
		match (self, other) {
			(Frame::App(a), Frame::App(b)) => Arc::ptr_eq(a, b),
			(Frame::Request(a), Frame::Request(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// The application context this frame makes current
	pub fn app_context(&self) -> Option<Arc<AppContext>> {
		match self {
			Frame::App(ctx) => Some(ctx.clone()),
			Frame::Request(ctx) => ctx.app_context().cloned(),
		}
	}

	fn describe(&self) -> String {
		match self {
			Frame::App(ctx) => format!("application context {:p}", Arc::as_ptr(ctx)),
			Frame::Request(ctx) => format!("request context {:p}", Arc::as_ptr(ctx)),
		}
	}
}

impl fmt::Debug for Frame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.describe())
	}
}

/// Ordered stack of active contexts; the last frame is current.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
	frames: Vec<Frame>,
}

impl ContextStack {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, frame: Frame) {
		self.frames.push(frame);
	}

	/// Remove the top frame, which must be `expected`.
	pub fn pop(&mut self, expected: &Frame) -> Result<Frame, ContractViolation> {
		match self.frames.last() {
			None => Err(ContractViolation::EmptyStack(expected.describe())),
			Some(top) if !top.is(expected) => Err(ContractViolation::StackMismatch {
				expected: expected.describe(),
				found: top.describe(),
			}),
			Some(_) => self
				.frames
				.pop()
				.ok_or_else(|| ContractViolation::EmptyStack(expected.describe())),
		}
	}

	pub fn current(&self) -> Option<&Frame> {
		self.frames.last()
	}

	/// The application context of the current frame
	pub fn top_app(&self) -> Option<Arc<AppContext>> {
		self.current().and_then(Frame::app_context)
	}

	/// The innermost request context
	pub fn top_request(&self) -> Option<Arc<RequestContext>> {
		self.frames.iter().rev().find_map(|frame| match frame {
			Frame::Request(ctx) => Some(ctx.clone()),
			Frame::App(_) => None,
		})
	}

	pub fn contains(&self, frame: &Frame) -> bool {
		self.frames.iter().any(|existing| existing.is(frame))
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}
}

/// Run a future inside a fresh, empty context stack.
pub async fn scope<F>(f: F) -> F::Output
where
	F: Future,
{
	CONTEXT_STACK
		.scope(RefCell::new(ContextStack::new()), f)
		.await
}

/// Run a future inside the current context stack, creating one if the task
/// has none yet.
pub async fn ensure_scope<F>(f: F) -> F::Output
where
	F: Future,
{
	if is_active() {
		f.await
	} else {
		scope(f).await
	}
}

/// Run a closure with `stack` installed as the task's context stack.
///
/// Works both inside and outside a tokio task; any existing stack is
/// shadowed for the duration of the call.
pub fn sync_scope<F, R>(stack: ContextStack, f: F) -> R
where
	F: FnOnce() -> R,
{
	CONTEXT_STACK.sync_scope(RefCell::new(stack), f)
}

pub fn is_active() -> bool {
	CONTEXT_STACK.try_with(|_| ()).is_ok()
}

/// Access the task-local stack, returning an error if no scope is active.
///
/// `f` must not call back into user code.
pub fn with_stack<R>(f: impl FnOnce(&mut ContextStack) -> R) -> Result<R, ContractViolation> {
	CONTEXT_STACK
		.try_with(|stack| f(&mut stack.borrow_mut()))
		.map_err(|_| ContractViolation::NoActiveScope)
}

pub fn push(frame: Frame) -> Result<(), ContractViolation> {
	tracing::trace!(frame = ?frame, "push context");
	with_stack(|stack| stack.push(frame))
}

pub fn pop(expected: &Frame) -> Result<Frame, ContractViolation> {
	tracing::trace!(frame = ?expected, "pop context");
	with_stack(|stack| stack.pop(expected))?
}

/// The top frame, or `None` if the stack is empty or no scope is active
pub fn current() -> Option<Frame> {
	with_stack(|stack| stack.current().cloned()).ok().flatten()
}

pub fn top_app() -> Option<Arc<AppContext>> {
	with_stack(|stack| stack.top_app()).ok().flatten()
}

pub fn top_request() -> Option<Arc<RequestContext>> {
	with_stack(|stack| stack.top_request()).ok().flatten()
}

/// Number of frames on the task's stack (0 when no scope is active)
pub fn depth() -> usize {
	with_stack(|stack| stack.len()).unwrap_or(0)
}
