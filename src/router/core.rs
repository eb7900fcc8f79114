//! Router core - tree structure, registration and path composition.
//!
//! The tree is an arena: router nodes and layers live in two vectors and
//! refer to each other by index. A node's parent is a plain id, used only to
//! compose paths, never for ownership. Composed paths and matchers are derived
//! data, recomputed top-down after every structural change and never during
//! matching.
//!
//! The arena sits behind an `Rc`. Registration builds the new arena on a copy
//! and swaps it in only on success, so a failed call leaves the router
//! untouched and a dispatch that is suspended mid-chain keeps running against
//! the tree it started with.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::delimiter_usable;
use crate::dispatcher::{Dispatch, Next, Shared};
use crate::error::{ConfigError, DispatchError, HandlerResult, RegistrationError};
use crate::handler::Layer;
use crate::pattern::{Matcher, PatternOptions};
use crate::request::Routable;
use crate::RouterOptions;

/// Index of a router node in the arena.
pub(crate) type RouterId = usize;

/// Index of a layer in the arena.
pub(crate) type LayerId = usize;

/// The router a [`Router`] handle represents.
pub(crate) const ROOT: RouterId = 0;

/// One stack entry. Insertion order is dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    Router(RouterId),
    Layer(LayerId),
}

#[derive(Debug, Clone)]
pub(crate) struct RouterNode {
    /// Segment this router was registered under
    pub(crate) segment: String,
    pub(crate) parent: Option<RouterId>,
    pub(crate) options: RouterOptions,
    pub(crate) stack: Vec<Entry>,
    /// Composed path, derived
    pub(crate) path: String,
    /// Prefix matcher compiled from `path`, derived
    pub(crate) matcher: Matcher,
}

pub(crate) struct Tree<Req, Res> {
    routers: Vec<RouterNode>,
    layers: Vec<Layer<Req, Res>>,
}

impl<Req, Res> Clone for Tree<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            routers: self.routers.clone(),
            layers: self.layers.clone(),
        }
    }
}

impl<Req, Res> Tree<Req, Res> {
    pub(crate) fn node(&self, id: RouterId) -> &RouterNode {
        &self.routers[id]
    }

    pub(crate) fn layer(&self, id: LayerId) -> &Layer<Req, Res> {
        &self.layers[id]
    }
}

/// A registration item.
///
/// `add` accepts any mixture of these; [`Mount::Group`]s are flattened in
/// place. A [`Mount::Segment`] is only valid as the first item, where it
/// establishes a nested router for the remaining items.
pub enum Mount<Req, Res> {
    /// Path segment for a nested router
    Segment(String),
    /// A handler layer
    Layer(Layer<Req, Res>),
    /// A router built elsewhere
    Router(Router<Req, Res>),
    /// Items to flatten
    Group(Vec<Mount<Req, Res>>),
}

impl<Req, Res> fmt::Debug for Mount<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Segment(s) => f.debug_tuple("Segment").field(s).finish(),
            Mount::Layer(l) => f.debug_tuple("Layer").field(l).finish(),
            Mount::Router(r) => f.debug_tuple("Router").field(&r.path()).finish(),
            Mount::Group(items) => f.debug_tuple("Group").field(items).finish(),
        }
    }
}

impl<Req, Res> From<&str> for Mount<Req, Res> {
    fn from(segment: &str) -> Self {
        Mount::Segment(segment.to_string())
    }
}

impl<Req, Res> From<String> for Mount<Req, Res> {
    fn from(segment: String) -> Self {
        Mount::Segment(segment)
    }
}

impl<Req, Res> From<Layer<Req, Res>> for Mount<Req, Res> {
    fn from(layer: Layer<Req, Res>) -> Self {
        Mount::Layer(layer)
    }
}

impl<Req, Res> From<Router<Req, Res>> for Mount<Req, Res> {
    fn from(router: Router<Req, Res>) -> Self {
        Mount::Router(router)
    }
}

impl<Req, Res> From<Vec<Mount<Req, Res>>> for Mount<Req, Res> {
    fn from(items: Vec<Mount<Req, Res>>) -> Self {
        Mount::Group(items)
    }
}

/// Composite dispatch node: an ordered stack of layers and nested routers.
///
/// ```rust
/// use middlewary::{Request, Router};
///
/// let mut app: Router<Request, Vec<&'static str>> = Router::new();
/// app.use_fn(|_req, res, next| {
///     res.push("seen");
///     next.proceed();
///     Ok(())
/// })
/// .unwrap();
///
/// let (_req, res, result) = app
///     .dispatch(Request::new("user.created"), Vec::new())
///     .into_parts()
///     .unwrap();
/// assert!(result.is_ok());
/// assert_eq!(res, vec!["seen"]);
/// ```
pub struct Router<Req, Res> {
    tree: Rc<Tree<Req, Res>>,
}

impl<Req, Res> Clone for Router<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
        }
    }
}

impl<Req, Res> fmt::Debug for Router<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.tree.node(ROOT);
        f.debug_struct("Router")
            .field("segment", &root.segment)
            .field("path", &root.path)
            .field("stack_len", &root.stack.len())
            .field("routers", &self.tree.routers.len())
            .field("layers", &self.tree.layers.len())
            .finish()
    }
}

impl<Req, Res> Default for Router<Req, Res> {
    fn default() -> Self {
        Self::root(RouterOptions::default())
    }
}

impl<Req, Res> Router<Req, Res> {
    /// A root router with default options, matching every routing key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A root router matching every routing key.
    ///
    /// The default segment is the delimiter itself, the universal wildcard.
    /// Fails if the options name an unusable delimiter.
    pub fn with_options(options: RouterOptions) -> Result<Self, ConfigError> {
        Ok(Self::root(options.validate()?))
    }

    fn root(options: RouterOptions) -> Self {
        let segment = options.delimiter.to_string();
        let path = compose_path(None, &segment, &options);
        let node = RouterNode {
            segment,
            parent: None,
            options,
            stack: Vec::new(),
            matcher: Matcher::match_all(options.delimiter),
            path,
        };
        Self {
            tree: Rc::new(Tree {
                routers: vec![node],
                layers: Vec::new(),
            }),
        }
    }

    /// Options this router matches with.
    #[must_use]
    pub fn options(&self) -> RouterOptions {
        self.tree.node(ROOT).options
    }

    /// Segment this router is registered under.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.tree.node(ROOT).segment
    }

    /// Composed path of this router.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.tree.node(ROOT).path
    }

    /// Number of entries on this router's own stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.node(ROOT).stack.len()
    }

    /// True when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(name, path)` of every layer in dispatch order, depth first.
    #[must_use]
    pub fn layer_paths(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.tree.layers.len());
        // Routers are expanded in place, so order matches dispatch order.
        let mut cursors: Vec<(RouterId, usize)> = vec![(ROOT, 0)];
        while let Some((id, idx)) = cursors.pop() {
            let node = self.tree.node(id);
            let Some(entry) = node.stack.get(idx) else {
                continue;
            };
            cursors.push((id, idx + 1));
            match *entry {
                Entry::Layer(l) => {
                    let layer = self.tree.layer(l);
                    out.push((layer.name().to_string(), layer.path().to_string()));
                }
                Entry::Router(r) => cursors.push((r, 0)),
            }
        }
        out
    }

    /// Log the route table at `info`.
    pub fn dump_routes(&self) {
        let table = self.layer_paths();
        info!(
            router_path = %self.path(),
            routers = self.tree.routers.len(),
            layers = table.len(),
            "Route table"
        );
        for (name, path) in &table {
            info!(layer = %name, path = %path, "Route");
        }
    }
}

impl<Req, Res> Router<Req, Res>
where
    Req: Routable + 'static,
    Res: 'static,
{
    /// A root router registered under `segment` with default options.
    pub fn at(segment: &str) -> Result<Self, RegistrationError> {
        Self::at_with_options(segment, RouterOptions::default())
    }

    /// A root router registered under `segment`.
    pub fn at_with_options(
        segment: &str,
        options: RouterOptions,
    ) -> Result<Self, RegistrationError> {
        if !delimiter_usable(options.delimiter) {
            return Err(RegistrationError::InvalidDelimiter(options.delimiter));
        }
        let mut router = Self::root(options);
        router.set_segment(segment)?;
        Ok(router)
    }

    /// Change the segment this router is registered under and re-derive every
    /// path below it.
    pub fn set_segment(&mut self, segment: &str) -> Result<(), RegistrationError> {
        let mut tree = (*self.tree).clone();
        tree.routers[ROOT].segment = segment.to_string();
        remount(&mut tree, ROOT)?;
        self.tree = Rc::new(tree);
        Ok(())
    }

    /// Register items on this router.
    ///
    /// Items are flattened and appended in order. A leading segment creates
    /// a nested router (inheriting these options) and the remaining items
    /// are registered on it instead. Routers built elsewhere are attached as
    /// children and their paths re-derived under this router.
    ///
    /// The call is all-or-nothing: on error the router is unchanged.
    pub fn add<I>(&mut self, items: I) -> Result<&mut Self, RegistrationError>
    where
        I: IntoIterator,
        I::Item: Into<Mount<Req, Res>>,
    {
        let mut flat = Vec::new();
        flatten(items.into_iter().map(Into::into), &mut flat);

        let mut tree = (*self.tree).clone();
        add_at(&mut tree, ROOT, flat)?;
        self.tree = Rc::new(tree);
        Ok(self)
    }

    /// Register `items` under a nested router for `segment`.
    pub fn route<I>(&mut self, segment: &str, items: I) -> Result<&mut Self, RegistrationError>
    where
        I: IntoIterator,
        I::Item: Into<Mount<Req, Res>>,
    {
        let mut all = vec![Mount::Segment(segment.to_string())];
        all.extend(items.into_iter().map(Into::into));
        self.add(all)
    }

    /// Register a request handler.
    pub fn use_fn<F>(&mut self, f: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut Req, &mut Res, Next<Req, Res>) -> HandlerResult + 'static,
    {
        self.add([Layer::request(f)])
    }

    /// Register an error handler.
    pub fn use_error_fn<F>(&mut self, f: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(DispatchError, &mut Req, &mut Res, Next<Req, Res>) -> HandlerResult + 'static,
    {
        self.add([Layer::error(f)])
    }

    /// Attach a router built elsewhere.
    pub fn use_router(&mut self, router: Router<Req, Res>) -> Result<&mut Self, RegistrationError> {
        self.add([router])
    }

    /// Recompute the composed path of every descendant router and layer.
    ///
    /// Registration keeps paths current on its own; this is only needed to
    /// force a re-derivation, for example after options were changed on a
    /// copy of the tree.
    pub fn mount(&mut self) -> Result<(), RegistrationError> {
        debug!(router_path = %self.path(), "Router mounts its stack");
        let mut tree = (*self.tree).clone();
        remount(&mut tree, ROOT)?;
        self.tree = Rc::new(tree);
        Ok(())
    }

    /// Dispatch `req`/`res` through this router.
    ///
    /// `done` receives the request (route state restored to what it was on
    /// entry), the response and the outcome: `Err` when an error was left
    /// unhandled.
    pub fn handle<F>(&self, req: Req, res: Res, done: F)
    where
        F: FnOnce(Req, Res, Result<(), DispatchError>) + 'static,
    {
        Shared::start(Rc::clone(&self.tree), req, res, Box::new(done));
    }

    /// Dispatch and report synchronously when the chain did not suspend.
    ///
    /// If a handler keeps its continuation this returns
    /// [`Dispatch::Suspended`], and whatever the chain produces once resumed
    /// is dropped. Use [`handle`](Self::handle) to observe it.
    pub fn dispatch(&self, req: Req, res: Res) -> Dispatch<Req, Res> {
        let slot: Rc<RefCell<Option<Dispatch<Req, Res>>>> = Rc::default();
        let returned = Rc::new(Cell::new(false));
        let sink = Rc::clone(&slot);
        let late = Rc::clone(&returned);
        self.handle(req, res, move |req, res, result| {
            if late.get() {
                debug!(
                    ok = result.is_ok(),
                    "Suspended dispatch completed; outcome discarded"
                );
                return;
            }
            *sink.borrow_mut() = Some(Dispatch::Completed { req, res, result });
        });
        returned.set(true);
        let outcome = slot.borrow_mut().take();
        outcome.unwrap_or(Dispatch::Suspended)
    }
}

fn flatten<Req, Res>(items: impl Iterator<Item = Mount<Req, Res>>, out: &mut Vec<Mount<Req, Res>>) {
    for item in items {
        match item {
            Mount::Group(inner) => flatten(inner.into_iter(), out),
            other => out.push(other),
        }
    }
}

/// Register flattened `items` on router `at`.
fn add_at<Req, Res>(
    tree: &mut Tree<Req, Res>,
    at: RouterId,
    items: Vec<Mount<Req, Res>>,
) -> Result<(), RegistrationError>
where
    Req: Routable + 'static,
    Res: 'static,
{
    let mut items = items.into_iter();
    let mut at = at;
    let mut first = items.next();

    // Each leading segment descends one level.
    while let Some(Mount::Segment(segment)) = first {
        debug!(route = %segment, "Router creates a new router for route");
        let options = tree.routers[at].options;
        let child = tree.routers.len();
        tree.routers.push(RouterNode {
            segment,
            parent: Some(at),
            options,
            stack: Vec::new(),
            path: String::new(),
            matcher: Matcher::match_all(options.delimiter),
        });
        tree.routers[at].stack.push(Entry::Router(child));
        remount(tree, child)?;
        at = child;
        first = items.next();
    }

    let rest: Vec<Mount<Req, Res>> = first.into_iter().chain(items).collect();
    if let Some(Mount::Segment(segment)) = rest.iter().find(|m| matches!(m, Mount::Segment(_))) {
        return Err(RegistrationError::MisplacedSegment {
            segment: segment.clone(),
        });
    }

    for item in rest {
        match item {
            Mount::Router(router) => {
                debug!(route = %router.segment(), "Router adds a router");
                let child = graft(tree, router);
                tree.routers[child].parent = Some(at);
                tree.routers[at].stack.push(Entry::Router(child));
                remount(tree, child)?;
            }
            Mount::Layer(mut layer) => {
                debug!(layer = %layer.name(), "Router adds a layer");
                let node = &tree.routers[at];
                layer.set_path(&node.path, &node.options)?;
                let id = tree.layers.len();
                tree.layers.push(layer);
                tree.routers[at].stack.push(Entry::Layer(id));
            }
            Mount::Segment(_) | Mount::Group(_) => {}
        }
    }
    Ok(())
}

/// Move `router`'s arena into `tree`, returning the new id of its root.
fn graft<Req, Res>(tree: &mut Tree<Req, Res>, router: Router<Req, Res>) -> RouterId {
    let other = Rc::try_unwrap(router.tree).unwrap_or_else(|shared| (*shared).clone());
    let router_base = tree.routers.len();
    let layer_base = tree.layers.len();

    for mut node in other.routers {
        node.parent = node.parent.map(|p| p + router_base);
        for entry in &mut node.stack {
            *entry = match *entry {
                Entry::Router(r) => Entry::Router(r + router_base),
                Entry::Layer(l) => Entry::Layer(l + layer_base),
            };
        }
        tree.routers.push(node);
    }
    tree.layers.extend(other.layers);
    router_base + ROOT
}

/// Re-derive paths and matchers for `from` and everything below it.
fn remount<Req, Res>(tree: &mut Tree<Req, Res>, from: RouterId) -> Result<(), RegistrationError>
where
    Req: Routable + 'static,
    Res: 'static,
{
    let mut pending = vec![from];
    while let Some(id) = pending.pop() {
        let node = &tree.routers[id];
        let parent_path = node.parent.map(|p| tree.routers[p].path.as_str());
        let path = compose_path(parent_path, &node.segment, &node.options);
        let options = node.options;
        let matcher = Matcher::compile(&path, PatternOptions::from_router(&options, false))?;

        for &entry in &node.stack {
            match entry {
                Entry::Router(child) => pending.push(child),
                Entry::Layer(l) => tree.layers[l].set_path(&path, &options)?,
            }
        }

        let node = &mut tree.routers[id];
        node.path = path;
        node.matcher = matcher;
    }
    Ok(())
}

/// Join `segment` onto `parent_path`.
///
/// A parent path that is empty or exactly the delimiter contributes nothing.
pub(crate) fn compose_path(parent_path: Option<&str>, segment: &str, opts: &RouterOptions) -> String {
    let delimiter = opts.delimiter;
    let parent = parent_path.filter(|p| !p.is_empty() && !is_delimiter(p, delimiter));

    match parent {
        Some(parent) if !segment.is_empty() => {
            trim_path(&format!("{parent}{delimiter}{segment}"), opts)
        }
        Some(parent) => trim_path(parent, opts),
        None if !segment.is_empty() => trim_path(segment, opts),
        None => String::new(),
    }
}

fn is_delimiter(s: &str, delimiter: char) -> bool {
    let mut chars = s.chars();
    chars.next() == Some(delimiter) && chars.next().is_none()
}

/// Trim delimiters from the end of `path`, and from the start as well when
/// `trim_left` is set. Paths shorter than two characters are left alone.
pub(crate) fn trim_path(path: &str, opts: &RouterOptions) -> String {
    let delimiter = opts.delimiter;
    if path.chars().count() < 2 {
        return path.to_string();
    }
    let trimmed = path.trim_end_matches(delimiter);
    if opts.trim_left {
        trimmed.trim_start_matches(delimiter).to_string()
    } else {
        trimmed.to_string()
    }
}
