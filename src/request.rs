//! Request-side contract consulted by the dispatch core.
//!
//! The core never inspects request or response shapes beyond the
//! [`Routable`] trait: a routing key to match against, and a [`RouteState`]
//! slot that routers overwrite on entry and restore on exit.

use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of captured parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured route parameters in capture order.
///
/// Names are shared with the compiled matcher; values are per-dispatch data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Route metadata installed on the request by the innermost matching router.
///
/// This is everything the restore discipline captures: on entering a router
/// the previous value is saved, and on leaving it (normally, with an error or
/// through an exit) the saved value is written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteState {
    /// Parameters captured by the router's matcher
    pub params: ParamVec,
    /// The portion of the routing key the router matched
    pub matched: Option<String>,
}

impl RouteState {
    /// Get a parameter by name. Names are unique after capture processing.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when no router has installed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.matched.is_none()
    }
}

/// Anything that can be dispatched through a [`Router`](crate::Router).
pub trait Routable {
    /// The key matched against router and layer patterns.
    fn routing_key(&self) -> &str;

    /// Route metadata installed by the enclosing router.
    fn route_state(&self) -> &RouteState;

    /// Mutable access used by the dispatch core to install and restore state.
    fn route_state_mut(&mut self) -> &mut RouteState;

    /// Shorthand for `route_state().param(name)`.
    fn param(&self, name: &str) -> Option<&str> {
        self.route_state().param(name)
    }
}

/// A ready-made [`Routable`] carrying a routing key and an arbitrary body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request<B = ()> {
    /// Routing key, e.g. `user.created`
    pub key: String,
    /// Application payload
    pub body: B,
    /// Installed by routers during dispatch
    pub route: RouteState,
}

impl Request<()> {
    /// A request with no body.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_body(key, ())
    }
}

impl<B> Request<B> {
    /// A request carrying `body`.
    pub fn with_body(key: impl Into<String>, body: B) -> Self {
        Self {
            key: key.into(),
            body,
            route: RouteState::default(),
        }
    }
}

impl<B> Routable for Request<B> {
    fn routing_key(&self) -> &str {
        &self.key
    }

    fn route_state(&self) -> &RouteState {
        &self.route
    }

    fn route_state_mut(&mut self) -> &mut RouteState {
        &mut self.route
    }
}
