//! # Dispatcher Module
//!
//! The dispatcher drives a request/response pair through a router tree.
//!
//! ## Overview
//!
//! Every node in the tree sits behind the same two entrypoints, normal
//! dispatch and error dispatch, so routers and handler layers are
//! interchangeable stack entries. For each stack entry, in registration order:
//!
//! 1. A nested router is entered only in normal mode and only when its pattern
//!    matches the routing key. Entering saves the request's
//!    [`RouteState`](crate::RouteState) and installs the router's captures;
//!    leaving writes the saved state back, however the router finishes.
//! 2. A layer runs only when its path matches and its kind suits the current
//!    mode (request handlers in normal mode, error handlers in error mode).
//! 3. The handler resumes its [`Next`] to move on, possibly with an error, a
//!    "handled" marker or an "exit" marker.
//!
//! When a router's stack is exhausted its outcome is handed to the parent on
//! a later turn of the dispatch loop rather than through a nested call.
//!
//! ## Request Flow
//!
//! ```text
//! handle(req, res, done)
//!   → root matches routing key?  no → done(Ok)
//!   → step through stack
//!       ├─ router: match → push frame, step into it
//!       ├─ layer (normal): handler(req, res, next)
//!       └─ layer (error):  handler(err, req, res, next)
//!   → stack exhausted → restore route state → parent continues
//!   → root exhausted → done(req, res, result)
//! ```
//!
//! ## Suspension
//!
//! A handler may keep its continuation and resume it later. The call to
//! [`Router::dispatch`](crate::Router::dispatch) then returns
//! [`Dispatch::Suspended`] and completion is delivered to the callback given
//! to [`Router::handle`](crate::Router::handle) once the chain finishes.
//! There is no timeout: a continuation that is dropped unused abandons the
//! dispatch.

mod core;

pub(crate) use core::{Pending, Shared};
pub use core::{Dispatch, Done, Next, Signal};
