//! # Handler Module
//!
//! A [`Layer`] wraps exactly one user callback and dispatches to it under the
//! uniform two-entrypoint contract shared with routers:
//!
//! - [`Layer::dispatch_normal`] runs request handlers
//! - [`Layer::dispatch_error`] runs error handlers
//!
//! ## Handler kinds
//!
//! The kind of a callback is fixed when it is wrapped, by the constructor
//! used, rather than inspected at dispatch time:
//!
//! | Kind | Signature | Arity |
//! |---|---|---|
//! | [`Handler::Request`] | `Fn(&mut Req, &mut Res, Next) -> HandlerResult` | 3 |
//! | [`Handler::Error`] | `Fn(DispatchError, &mut Req, &mut Res, Next) -> HandlerResult` | 4 |
//!
//! A layer asked to run in the mode it was not built for is not eligible and
//! steps aside: error handlers let normal flow continue untouched, request
//! handlers forward the pending error unchanged.
//!
//! ## Failure boundary
//!
//! Errors returned by a callback and panics raised inside it are caught at the
//! layer and handed to its continuation as a dispatch error. Nothing escapes to
//! the caller of the dispatch core.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use anyhow::anyhow;
use tracing::{debug, error, warn};

use crate::dispatcher::{Next, Pending};
use crate::error::{DispatchError, HandlerResult, RegistrationError};
use crate::pattern::{Matcher, PatternOptions};
use crate::request::Routable;
use crate::RouterOptions;

#[cfg(test)]
mod tests;

/// Placeholder name for callbacks that have none.
pub const ANONYMOUS: &str = "<anonymous>";

/// Request handler callback.
pub type RequestFn<Req, Res> = Rc<dyn Fn(&mut Req, &mut Res, Next<Req, Res>) -> HandlerResult>;

/// Error handler callback. Receives ownership of the pending error.
pub type ErrorFn<Req, Res> =
    Rc<dyn Fn(DispatchError, &mut Req, &mut Res, Next<Req, Res>) -> HandlerResult>;

/// A wrapped callback, tagged with the mode it participates in.
pub enum Handler<Req, Res> {
    /// Participates in normal dispatch only
    Request(RequestFn<Req, Res>),
    /// Participates in error dispatch only
    Error(ErrorFn<Req, Res>),
}

impl<Req, Res> Handler<Req, Res> {
    /// Number of parameters the callback declares.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Handler::Request(_) => 3,
            Handler::Error(_) => 4,
        }
    }

    /// True for [`Handler::Error`].
    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        matches!(self, Handler::Error(_))
    }
}

impl<Req, Res> Clone for Handler<Req, Res> {
    fn clone(&self) -> Self {
        match self {
            Handler::Request(f) => Handler::Request(Rc::clone(f)),
            Handler::Error(f) => Handler::Error(Rc::clone(f)),
        }
    }
}

impl<Req, Res> fmt::Debug for Handler<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Request(_) => f.write_str("Handler::Request"),
            Handler::Error(_) => f.write_str("Handler::Error"),
        }
    }
}

/// Handler unit: one callback plus its display name and route metadata.
pub struct Layer<Req, Res> {
    name: String,
    handler: Handler<Req, Res>,
    path: String,
    matcher: Matcher,
}

impl<Req, Res> Clone for Layer<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
            path: self.path.clone(),
            matcher: self.matcher.clone(),
        }
    }
}

impl<Req, Res> fmt::Debug for Layer<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("handler", &self.handler)
            .field("path", &self.path)
            .finish()
    }
}

/// Derive a display name from a callable's type.
///
/// Named functions yield their last path segment; closures have no name.
pub(crate) fn display_name<F: ?Sized>() -> String {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return ANONYMOUS.to_string();
    }
    let base = full.split('<').next().unwrap_or(full);
    match base.rsplit("::").next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}

impl<Req, Res> Layer<Req, Res> {
    /// Override the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the wrapped callback wholesale.
    pub fn assign(&mut self, name: impl Into<String>, handler: Handler<Req, Res>) {
        self.name = name.into();
        self.handler = handler;
    }

    /// Display name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &Handler<Req, Res> {
        &self.handler
    }

    /// Composed path of the router this layer is registered on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<Req, Res> Layer<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// Wrap a request handler.
    pub fn request<F>(f: F) -> Self
    where
        F: Fn(&mut Req, &mut Res, Next<Req, Res>) -> HandlerResult + 'static,
    {
        Self::from_handler(display_name::<F>(), Handler::Request(Rc::new(f)))
    }

    /// Wrap an error handler.
    pub fn error<F>(f: F) -> Self
    where
        F: Fn(DispatchError, &mut Req, &mut Res, Next<Req, Res>) -> HandlerResult + 'static,
    {
        Self::from_handler(display_name::<F>(), Handler::Error(Rc::new(f)))
    }

    /// Wrap an already-tagged handler.
    pub fn from_handler(name: impl Into<String>, handler: Handler<Req, Res>) -> Self {
        let name = name.into();
        debug!(layer = %name, arity = handler.arity(), "Router creates a new layer");
        Self {
            name,
            handler,
            path: String::new(),
            matcher: Matcher::match_all(RouterOptions::default().delimiter),
        }
    }

    /// True when the layer's path matches `key` exactly.
    ///
    /// A key that matches but cannot be percent-decoded is treated as a match;
    /// the enclosing router has already reported the decoding failure.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        !matches!(self.matcher.matches(key), Ok(None))
    }

    /// Re-anchor the layer on a router path.
    pub(crate) fn set_path(
        &mut self,
        path: &str,
        opts: &RouterOptions,
    ) -> Result<(), RegistrationError> {
        self.matcher = Matcher::compile(path, PatternOptions::from_router(opts, true))?;
        self.path = path.to_string();
        Ok(())
    }

    /// Run the layer in normal mode.
    ///
    /// Error handlers are not eligible: the continuation resumes with no
    /// error and the layer has no effect.
    pub fn dispatch_normal(&self, req: &mut Req, res: &mut Res, next: Next<Req, Res>) {
        let f = match &self.handler {
            Handler::Request(f) => f,
            Handler::Error(_) => {
                debug!(
                    layer = %self.name,
                    "Layer cannot handle request (not a request handler)"
                );
                next.proceed();
                return;
            }
        };

        debug!(layer = %self.name, path = %self.path, "Layer is handling request");
        let pending = next.pending();
        let outcome = catch_unwind(AssertUnwindSafe(|| f(req, res, next)));
        self.settle(outcome, pending);
    }

    /// Run the layer in error mode.
    ///
    /// Request handlers are not eligible: the error is forwarded unchanged.
    pub fn dispatch_error(
        &self,
        err: DispatchError,
        req: &mut Req,
        res: &mut Res,
        next: Next<Req, Res>,
    ) {
        let f = match &self.handler {
            Handler::Error(f) => f,
            Handler::Request(_) => {
                debug!(
                    layer = %self.name,
                    "Layer cannot handle error (not an error handler)"
                );
                next.fail(err);
                return;
            }
        };

        debug!(layer = %self.name, path = %self.path, error = %err, "Layer is handling error");
        let pending = next.pending();
        let outcome = catch_unwind(AssertUnwindSafe(|| f(err, req, res, next)));
        self.settle(outcome, pending);
    }

    fn settle(&self, outcome: Result<HandlerResult, Box<dyn Any + Send>>, pending: Pending<Req, Res>) {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if let Err(err) = pending.fail(err) {
                    warn!(
                        layer = %self.name,
                        error = %err,
                        "Handler returned an error after resuming its continuation; dropped"
                    );
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    layer = %self.name,
                    panic_message = %message,
                    "Handler panicked"
                );
                let err = anyhow!("handler '{}' panicked: {}", self.name, message);
                if let Err(err) = pending.fail(err) {
                    warn!(
                        layer = %self.name,
                        error = %err,
                        "Handler panicked after resuming its continuation; dropped"
                    );
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
