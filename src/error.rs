//! Error types shared across the crate.
//!
//! There are three kinds of failure:
//!
//! - **Registration errors** ([`RegistrationError`]) are returned synchronously
//!   by [`Router::add`](crate::Router::add) and friends. They are fatal to that
//!   call and are never seen by the dispatch core.
//! - **Dispatch errors** ([`DispatchError`]) are any value handed to a
//!   continuation. They travel down the stack in error mode until an error
//!   handler clears them or the tree is exhausted.
//! - **Configuration errors** ([`ConfigError`]) come from loading
//!   [`RouterOptions`](crate::RouterOptions) out of TOML or the environment.

use thiserror::Error;

/// Error value carried through continuations.
///
/// Handler failures, panics caught at the handler boundary and explicit
/// `next.fail(..)` calls all end up as one of these.
pub type DispatchError = anyhow::Error;

/// Result type returned by every handler callback.
pub type HandlerResult = anyhow::Result<()>;

/// Raised when a registration call is given something the router cannot mount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A path segment could not be compiled into a matcher.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The composed pattern that failed to compile
        pattern: String,
        /// Why compilation failed
        reason: String,
    },
    /// A path segment appeared after the first registration item.
    ///
    /// Only a leading segment establishes a nested router; anywhere else the
    /// router would be asked to wrap a string as a handler.
    #[error("route segment '{segment}' must be the first item of a registration call")]
    MisplacedSegment {
        /// The offending segment
        segment: String,
    },
    /// The router options name a delimiter the pattern syntax cannot split on.
    #[error("invalid delimiter {0:?}: must be a single non-alphanumeric character")]
    InvalidDelimiter(char),
}

/// Raised when router options cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read router options from {path}")]
    Io {
        /// Path that was being read
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The configuration document is not valid TOML for [`RouterOptions`](crate::RouterOptions).
    #[error("failed to parse router options")]
    Parse(#[from] toml::de::Error),
    /// An environment override holds a value of the wrong shape.
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv {
        /// Name of the environment variable
        var: &'static str,
        /// The rejected value
        value: String,
    },
    /// Delimiters must be a single, non-alphanumeric character.
    #[error("invalid delimiter {0:?}: must be a single non-alphanumeric character")]
    InvalidDelimiter(char),
}

/// Raised when a captured segment cannot be percent-decoded.
///
/// Surfaces during dispatch as a [`DispatchError`] at the position of the
/// router whose matcher produced it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decode parameter '{name}' from '{value}'")]
pub struct MatchError {
    /// Parameter key
    pub name: String,
    /// Raw captured text
    pub value: String,
}
