//! # Router Module
//!
//! Routers are composite dispatch nodes: an ordered stack of handler layers
//! and nested routers, all sharing one set of matching options.
//!
//! ## Overview
//!
//! A router is responsible for:
//! - Accepting registrations (layers, routers, segment-prefixed groups)
//! - Composing its path from its own segment and its parent's path
//! - Prefix-matching routing keys so nested stacks only see keys under them
//! - Handing a dispatch call to the traversal in [`crate::dispatcher`]
//!
//! ## Paths
//!
//! A router's path is its segment joined to the parent's path with the
//! delimiter, with trailing delimiters trimmed (leading ones too when
//! `trim_left` is set). A parent whose path is empty or the bare delimiter
//! contributes nothing, so a default root router does not prefix its
//! children. Layers exact-match the path of the router they sit on.
//!
//! | Registration | Composed path |
//! |---|---|
//! | `Router::new()` | `.` (matches everything) |
//! | `route("user", ..)` on the root | `user` |
//! | `route(":id", ..)` under `user` | `user.:id` |
//!
//! ## Example
//!
//! ```rust
//! use middlewary::{Layer, Request, Routable, Router};
//!
//! let mut app: Router<Request, Vec<String>> = Router::new();
//! app.route(
//!     "user.:id",
//!     [Layer::request(|req: &mut Request, res: &mut Vec<String>, next| {
//!         res.push(format!("user {}", req.param("id").unwrap_or("?")));
//!         next.proceed();
//!         Ok(())
//!     })],
//! )
//! .unwrap();
//!
//! let (_req, res, _) = app
//!     .dispatch(Request::new("user.42"), Vec::new())
//!     .into_parts()
//!     .unwrap();
//! assert_eq!(res, vec!["user 42".to_string()]);
//! ```

mod core;

pub(crate) use core::{Entry, RouterId, Tree, ROOT};
pub use core::{Mount, Router};
