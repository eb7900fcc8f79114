//! Dispatcher core - the continuation-passing traversal.
//!
//! A dispatch call owns a [`Run`]: the request and response, a stack of
//! frames (one per router entered, each with its own cursor and the route
//! state it must restore), and the outer completion callback. Nothing
//! per-call is stored on tree nodes, so any number of overlapping dispatches
//! can share one router.
//!
//! Continuations never call back into the traversal directly. Resuming a
//! [`Next`] queues a [`Signal`]; a trampoline loop drains the queue and
//! performs one step per signal. Native stack depth therefore stays constant
//! no matter how long a chain or how deep a tree is, and a handler may keep
//! its continuation and resume it later, at which point the loop picks up
//! where it stopped.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::request::{Routable, RouteState};
use crate::router::{Entry, RouterId, Tree, ROOT};

/// Value handed to a continuation.
#[derive(Debug)]
pub enum Signal {
    /// Move on with no error
    Continue,
    /// The pending error was dealt with; resume normal flow
    Handled,
    /// Abandon every remaining entry at every level and complete with no error
    Exit,
    /// Switch to (or stay in) error mode with this error
    Error(DispatchError),
}

impl Signal {
    /// True for [`Signal::Error`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Signal::Error(_))
    }
}

impl From<DispatchError> for Signal {
    fn from(err: DispatchError) -> Self {
        Signal::Error(err)
    }
}

/// Outer completion callback of a dispatch call.
pub type Done<Req, Res> = Box<dyn FnOnce(Req, Res, Result<(), DispatchError>)>;

/// Outcome of [`Router::dispatch`](crate::Router::dispatch).
#[derive(Debug)]
pub enum Dispatch<Req, Res> {
    /// The chain ran to completion before `dispatch` returned
    Completed {
        /// The request, with its route state restored
        req: Req,
        /// The response as the handlers left it
        res: Res,
        /// `Err` when an error surfaced unhandled
        result: Result<(), DispatchError>,
    },
    /// A handler kept its continuation and the chain has not finished.
    ///
    /// `Router::dispatch` has nowhere to deliver a later completion, so its
    /// outcome is discarded when the continuation resumes. Use
    /// `Router::handle` with a callback for chains that may suspend.
    Suspended,
}

impl<Req, Res> Dispatch<Req, Res> {
    /// True for [`Dispatch::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Dispatch::Completed { .. })
    }

    /// The parts of a completed dispatch, if it completed.
    pub fn into_parts(self) -> Option<(Req, Res, Result<(), DispatchError>)> {
        match self {
            Dispatch::Completed { req, res, result } => Some((req, res, result)),
            Dispatch::Suspended => None,
        }
    }
}

/// One router entered by a dispatch call.
struct Frame {
    router: RouterId,
    cursor: usize,
    saved: RouteState,
}

/// Per-call state.
struct Run<Req, Res> {
    tree: Rc<Tree<Req, Res>>,
    req: Req,
    res: Res,
    frames: Vec<Frame>,
    done: Option<Done<Req, Res>>,
}

/// State shared between a run and the continuations it hands out.
pub(crate) struct Shared<Req, Res> {
    /// The run, parked here while a handler holds its continuation
    run: RefCell<Option<Run<Req, Res>>>,
    queue: RefCell<VecDeque<Signal>>,
    outstanding: Cell<Option<u64>>,
    tickets: Cell<u64>,
    driving: Cell<bool>,
}

/// Single-use continuation handed to every handler.
///
/// Exactly one of [`proceed`](Next::proceed), [`handled`](Next::handled),
/// [`exit`](Next::exit), [`fail`](Next::fail) or [`resume`](Next::resume)
/// should be called, now or later. Dropping it without calling anything
/// abandons the dispatch: its completion callback never runs.
pub struct Next<Req, Res> {
    shared: Rc<Shared<Req, Res>>,
    ticket: u64,
}

/// Crate-internal handle used by a layer to report a failure on behalf of a
/// handler that has already consumed its [`Next`].
pub(crate) struct Pending<Req, Res> {
    shared: Rc<Shared<Req, Res>>,
    ticket: u64,
}

impl<Req, Res> fmt::Debug for Next<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("ticket", &self.ticket).finish()
    }
}

impl<Req, Res> Next<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// Continue with no error.
    pub fn proceed(self) {
        self.resume(Signal::Continue);
    }

    /// Mark the pending error as handled and resume normal flow downstream.
    pub fn handled(self) {
        self.resume(Signal::Handled);
    }

    /// Skip everything left at every level; the dispatch completes with no error.
    pub fn exit(self) {
        self.resume(Signal::Exit);
    }

    /// Continue in error mode.
    pub fn fail(self, err: impl Into<DispatchError>) {
        self.resume(Signal::Error(err.into()));
    }

    /// Resume with an explicit signal.
    pub fn resume(self, signal: Signal) {
        Shared::resume(&self.shared, self.ticket, signal);
    }

    pub(crate) fn pending(&self) -> Pending<Req, Res> {
        Pending {
            shared: Rc::clone(&self.shared),
            ticket: self.ticket,
        }
    }
}

impl<Req, Res> Pending<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// Resume with `err` if the continuation is still outstanding, otherwise
    /// hand the error back.
    pub(crate) fn fail(self, err: DispatchError) -> Result<(), DispatchError> {
        if self.shared.outstanding.get() != Some(self.ticket) {
            return Err(err);
        }
        Shared::resume(&self.shared, self.ticket, Signal::Error(err));
        Ok(())
    }
}

impl<Req, Res> Shared<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// Begin a dispatch call through the router at the root of `tree`.
    pub(crate) fn start(tree: Rc<Tree<Req, Res>>, mut req: Req, res: Res, done: Done<Req, Res>) {
        let root = tree.node(ROOT);
        let found = root.matcher.matches(req.routing_key());
        let hit = match found {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                debug!(
                    routing_key = %req.routing_key(),
                    router_path = %root.path,
                    "Router does not match, skipping"
                );
                done(req, res, Ok(()));
                return;
            }
            Err(err) => {
                done(req, res, Err(err.into()));
                return;
            }
        };

        debug!(
            routing_key = %req.routing_key(),
            router_path = %root.path,
            stack_len = root.stack.len(),
            "Router begins handling cycle"
        );
        let saved = std::mem::replace(
            req.route_state_mut(),
            RouteState {
                params: hit.params,
                matched: Some(hit.matched),
            },
        );

        let shared = Rc::new(Shared {
            run: RefCell::new(Some(Run {
                tree,
                req,
                res,
                frames: vec![Frame {
                    router: ROOT,
                    cursor: 0,
                    saved,
                }],
                done: Some(done),
            })),
            queue: RefCell::new(VecDeque::new()),
            outstanding: Cell::new(None),
            tickets: Cell::new(0),
            driving: Cell::new(false),
        });
        shared.queue.borrow_mut().push_back(Signal::Continue);
        Shared::drive(&shared);
    }

    fn issue(this: &Rc<Self>) -> Next<Req, Res> {
        let ticket = this.tickets.get() + 1;
        this.tickets.set(ticket);
        this.outstanding.set(Some(ticket));
        Next {
            shared: Rc::clone(this),
            ticket,
        }
    }

    fn resume(this: &Rc<Self>, ticket: u64, signal: Signal) {
        if this.outstanding.get() != Some(ticket) {
            warn!(
                ticket,
                signal = ?signal,
                "Continuation resumed after it was already used; ignored"
            );
            return;
        }
        this.outstanding.set(None);
        this.queue.borrow_mut().push_back(signal);
        if !this.driving.get() {
            Shared::drive(this);
        }
    }

    /// Drain queued signals until the run completes or a handler keeps its
    /// continuation.
    fn drive(this: &Rc<Self>) {
        let Some(mut run) = this.run.borrow_mut().take() else {
            return;
        };
        this.driving.set(true);

        loop {
            let signal = this.queue.borrow_mut().pop_front();
            let Some(signal) = signal else {
                // A handler still holds its continuation.
                *this.run.borrow_mut() = Some(run);
                this.driving.set(false);
                return;
            };
            if let Some(result) = run.step(this, signal) {
                this.driving.set(false);
                let Run { req, res, done, .. } = run;
                if let Some(done) = done {
                    done(req, res, result);
                }
                return;
            }
        }
    }
}

impl<Req, Res> Run<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// Advance the traversal by one signal.
    ///
    /// Returns the final result once the root frame is finished.
    fn step(
        &mut self,
        shared: &Rc<Shared<Req, Res>>,
        signal: Signal,
    ) -> Option<Result<(), DispatchError>> {
        let mut err = match signal {
            Signal::Continue | Signal::Handled => None,
            Signal::Error(err) => Some(err),
            Signal::Exit => {
                debug!(frames = self.frames.len(), "Exit signal, unwinding every router");
                while let Some(frame) = self.frames.pop() {
                    *self.req.route_state_mut() = frame.saved;
                }
                return Some(Ok(()));
            }
        };

        let tree = Rc::clone(&self.tree);
        loop {
            let frame = self.frames.last_mut()?;
            let node = tree.node(frame.router);

            if frame.cursor >= node.stack.len() {
                debug!(router_path = %node.path, "Router's stack is done");
                let saved = std::mem::take(&mut frame.saved);
                self.frames.pop();
                *self.req.route_state_mut() = saved;

                if self.frames.is_empty() {
                    return Some(match err {
                        Some(err) => Err(err),
                        None => Ok(()),
                    });
                }
                // Hand the outcome to the parent on a later turn.
                shared
                    .queue
                    .borrow_mut()
                    .push_back(err.map_or(Signal::Continue, Signal::Error));
                return None;
            }

            let entry = node.stack[frame.cursor];
            frame.cursor += 1;
            let position = frame.cursor;

            match entry {
                Entry::Router(child) => {
                    let child_node = tree.node(child);
                    if err.is_some() {
                        debug!(
                            router_path = %child_node.path,
                            "Router does not handle errors from outside"
                        );
                        continue;
                    }
                    match child_node.matcher.matches(self.req.routing_key()) {
                        Ok(Some(hit)) => {
                            debug!(
                                router_path = %child_node.path,
                                matched = %hit.matched,
                                "Router begins handling cycle"
                            );
                            let saved = std::mem::replace(
                                self.req.route_state_mut(),
                                RouteState {
                                    params: hit.params,
                                    matched: Some(hit.matched),
                                },
                            );
                            self.frames.push(Frame {
                                router: child,
                                cursor: 0,
                                saved,
                            });
                        }
                        Ok(None) => {
                            debug!(
                                routing_key = %self.req.routing_key(),
                                router_path = %child_node.path,
                                "Router does not match, skipping"
                            );
                        }
                        Err(decode) => {
                            debug!(router_path = %child_node.path, error = %decode, "Router match failed");
                            err = Some(decode.into());
                        }
                    }
                }
                Entry::Layer(id) => {
                    let layer = tree.layer(id);
                    if !layer.matches(self.req.routing_key()) {
                        continue;
                    }

                    let next = Shared::issue(shared);
                    match err.take() {
                        Some(e) => {
                            debug!(
                                "layer {} of {} handles error",
                                position,
                                node.stack.len()
                            );
                            layer.dispatch_error(e, &mut self.req, &mut self.res, next);
                        }
                        None => {
                            debug!(
                                "layer {} of {} handles request",
                                position,
                                node.stack.len()
                            );
                            layer.dispatch_normal(&mut self.req, &mut self.res, next);
                        }
                    }
                    return None;
                }
            }
        }
    }
}
