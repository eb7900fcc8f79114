//! # Router Options
//!
//! Per-router matching options. Nested routers created through a leading path
//! segment inherit the options of the router they are registered on; routers
//! built independently keep their own.
//!
//! ## Sources
//!
//! Options can be built in code, parsed from TOML, or overlaid from the
//! environment:
//!
//! ```toml
//! case_sensitive = false
//! strict = true
//! delimiter = "/"
//! trim_left = true
//! ```
//!
//! ### Environment variables
//!
//! - `MIDDLEWARY_CASE_SENSITIVE` (`true`/`false`)
//! - `MIDDLEWARY_STRICT` (`true`/`false`)
//! - `MIDDLEWARY_DELIMITER` (a single character)
//! - `MIDDLEWARY_TRIM_LEFT` (`true`/`false`)
//!
//! ```rust
//! use middlewary::RouterOptions;
//!
//! let opts = RouterOptions::from_toml_str("delimiter = \"/\"").unwrap();
//! assert_eq!(opts.delimiter, '/');
//! assert!(opts.strict);
//! ```

use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Characters reserved by the pattern syntax; they cannot separate segments.
const RESERVED: [char; 3] = [':', '*', '?'];

/// Matching options for a router and the layers registered on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterOptions {
    /// Pattern matching respects letter case when true (default: true)
    pub case_sensitive: bool,
    /// When true a trailing delimiter on the routing key is significant (default: true)
    pub strict: bool,
    /// Segment separator used for composing and matching paths (default: `.`)
    pub delimiter: char,
    /// Trim the leading delimiter as well as the trailing one when composing
    /// paths (default: false, trailing only)
    pub trim_left: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            strict: true,
            delimiter: '.',
            trim_left: false,
        }
    }
}

impl RouterOptions {
    /// Parse options from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        let opts: RouterOptions = toml::from_str(doc)?;
        opts.validate()
    }

    /// Read and parse a TOML options file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&doc)
    }

    /// Defaults overlaid with the `MIDDLEWARY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Overlay any `MIDDLEWARY_*` environment variables onto these options.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(v) = env_bool("MIDDLEWARY_CASE_SENSITIVE")? {
            self.case_sensitive = v;
        }
        if let Some(v) = env_bool("MIDDLEWARY_STRICT")? {
            self.strict = v;
        }
        if let Some(v) = env_bool("MIDDLEWARY_TRIM_LEFT")? {
            self.trim_left = v;
        }
        if let Ok(val) = env::var("MIDDLEWARY_DELIMITER") {
            let mut chars = val.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => self.delimiter = c,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "MIDDLEWARY_DELIMITER",
                        value: val,
                    })
                }
            }
        }
        self.validate()
    }

    /// Builder-style setter for [`case_sensitive`](Self::case_sensitive).
    #[must_use]
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Builder-style setter for [`strict`](Self::strict).
    #[must_use]
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }

    /// Builder-style setter for [`delimiter`](Self::delimiter).
    #[must_use]
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder-style setter for [`trim_left`](Self::trim_left).
    #[must_use]
    pub fn trim_left(mut self, yes: bool) -> Self {
        self.trim_left = yes;
        self
    }

    /// Reject a delimiter the pattern syntax cannot split on.
    ///
    /// Options read from TOML or the environment are checked on load; options
    /// built in code are checked when a router is created from them.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !delimiter_usable(self.delimiter) {
            return Err(ConfigError::InvalidDelimiter(self.delimiter));
        }
        Ok(self)
    }
}

pub(crate) fn delimiter_usable(d: char) -> bool {
    !(d.is_alphanumeric() || d.is_whitespace() || RESERVED.contains(&d))
}

fn env_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(val) => match val.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv { var, value: val }),
        },
        Err(_) => Ok(None),
    }
}
