//! # middlewary
//!
//! **middlewary** is a composable middleware dispatch engine: ordered stacks of
//! handlers and nested routers, matched against delimiter-separated routing
//! keys, driven by continuation passing.
//!
//! ## Overview
//!
//! A [`Router`] holds an ordered stack of entries. Each entry is either a
//! handler [`Layer`] or another router. Dispatching a request walks the stack
//! in registration order; every handler receives a single-use [`Next`] and
//! decides whether (and when) to move on, and whether to move on with an error.
//!
//! Handlers come in two kinds, fixed when they are wrapped:
//!
//! - **request handlers** `(req, res, next)` run while no error is pending
//! - **error handlers** `(err, req, res, next)` run only while one is
//!
//! Nested routers prefix-match the routing key and install captured
//! parameters on the request for the duration of their stack, then restore
//! whatever was there before, however they finish.
//!
//! ## Architecture
//!
//! - **[`router`]** - registration, path composition, the router tree
//! - **[`dispatcher`]** - continuation-passing traversal and the [`Next`] handle
//! - **[`handler`]** - handler kinds and the [`Layer`] wrapper
//! - **[`pattern`]** - pattern compilation and matching
//! - **[`request`]** - the [`Routable`] contract and a ready-made [`Request`]
//! - **[`config`]** - [`RouterOptions`] from code, TOML or the environment
//! - **[`telemetry`]** - `tracing` subscriber setup
//! - **[`error`]** - error types
//!
//! ## Example
//!
//! ```rust
//! use anyhow::anyhow;
//! use middlewary::{Request, Router};
//!
//! let mut app: Router<Request, Vec<String>> = Router::new();
//! app.use_fn(|_req, res, next| {
//!     res.push("auth".into());
//!     next.proceed();
//!     Ok(())
//! })
//! .unwrap();
//! app.route("order.:id", [middlewary::Layer::request(
//!     |_req: &mut Request, _res: &mut Vec<String>, _next| Err(anyhow!("out of stock")),
//! )])
//! .unwrap();
//! app.use_error_fn(|err, _req, res, next| {
//!     res.push(format!("recovered: {err}"));
//!     next.handled();
//!     Ok(())
//! })
//! .unwrap();
//!
//! let (req, res, result) = app
//!     .dispatch(Request::new("order.7"), Vec::new())
//!     .into_parts()
//!     .unwrap();
//! assert!(result.is_ok());
//! assert_eq!(res, vec!["auth", "recovered: out of stock"]);
//! assert!(req.route.is_empty());
//! ```
//!
//! ## Threading
//!
//! Routers and continuations are single-threaded (`Rc`, not `Arc`). Handlers
//! may suspend by keeping their [`Next`] and resuming it later from the same
//! thread, e.g. from an event loop callback.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pattern;
pub mod request;
pub mod router;
pub mod telemetry;

pub use config::RouterOptions;
pub use dispatcher::{Dispatch, Done, Next, Signal};
pub use error::{ConfigError, DispatchError, HandlerResult, MatchError, RegistrationError};
pub use handler::{Handler, Layer};
pub use request::{ParamVec, Request, Routable, RouteState};
pub use router::{Mount, Router};
