//! # Pattern Module
//!
//! Compiles route patterns into matchers and runs them against routing keys.
//!
//! ## Syntax
//!
//! Patterns are split on the configured delimiter (`.` by default). Each
//! segment is one of:
//!
//! - a literal, matched exactly (`user`)
//! - a named parameter, matching one whole segment (`:id`)
//! - an optional named parameter, which may be absent together with its
//!   leading delimiter (`:format?`)
//! - text containing `*`, where each `*` matches anything (delimiters
//!   included) and is captured positionally as `0`, `1`, ...
//!
//! A pattern that is empty, exactly `*`, or exactly the delimiter is the
//! universal wildcard: it matches every key without running a regex and
//! captures the whole key as parameter `0`.
//!
//! ## Example
//!
//! ```rust
//! use middlewary::pattern::{Matcher, PatternOptions};
//!
//! let m = Matcher::compile("user.:id", PatternOptions::default()).unwrap();
//! let hit = m.matches("user.42").unwrap().unwrap();
//! assert_eq!(hit.param("id"), Some("42"));
//! assert!(m.matches("order.42").unwrap().is_none());
//! ```

use std::sync::Arc;

use regex::Regex;

use crate::error::{MatchError, RegistrationError};
use crate::request::ParamVec;
use crate::RouterOptions;


/// Options consumed by the pattern compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    /// Respect letter case
    pub case_sensitive: bool,
    /// A trailing delimiter on the key is significant
    pub strict: bool,
    /// Anchor at the end of the key; when false the pattern matches a prefix
    /// ending on a segment boundary
    pub end: bool,
    /// Segment separator
    pub delimiter: char,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self::from_router(&RouterOptions::default(), true)
    }
}

impl PatternOptions {
    /// Derive compiler options from router options.
    #[must_use]
    pub fn from_router(opts: &RouterOptions, end: bool) -> Self {
        Self {
            case_sensitive: opts.case_sensitive,
            strict: opts.strict,
            end,
            delimiter: opts.delimiter,
        }
    }
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Decoded captures, one entry per distinct key
    pub params: ParamVec,
    /// The matched portion of the key, without the trailing delimiter
    pub matched: String,
}

impl PathMatch {
    /// Get a captured parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    All,
    Regex { regex: Regex, keys: Vec<Arc<str>> },
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    delimiter: char,
    compiled: Compiled,
}

/// True when `path` is the universal wildcard for `delimiter`.
#[must_use]
pub fn is_wildcard(path: &str, delimiter: char) -> bool {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (None, _) => true,
        (Some(c), None) => c == '*' || c == delimiter,
        _ => false,
    }
}

impl Matcher {
    /// Compile `pattern` with the given options.
    pub fn compile(pattern: &str, opts: PatternOptions) -> Result<Self, RegistrationError> {
        if is_wildcard(pattern, opts.delimiter) {
            return Ok(Self {
                pattern: pattern.to_string(),
                ..Self::match_all(opts.delimiter)
            });
        }

        let (regex, keys) = Self::pattern_to_regex(pattern, opts)?;
        Ok(Self {
            pattern: pattern.to_string(),
            delimiter: opts.delimiter,
            compiled: Compiled::Regex { regex, keys },
        })
    }

    /// The universal wildcard matcher.
    #[must_use]
    pub fn match_all(delimiter: char) -> Self {
        Self {
            pattern: String::new(),
            delimiter,
            compiled: Compiled::All,
        }
    }

    /// The pattern this matcher was compiled from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True for the wildcard fast path.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        matches!(self.compiled, Compiled::All)
    }

    /// Capture keys in capture-group order (empty for the wildcard).
    #[must_use]
    pub fn keys(&self) -> &[Arc<str>] {
        match &self.compiled {
            Compiled::All => &[],
            Compiled::Regex { keys, .. } => keys,
        }
    }

    /// Match `key` against this pattern.
    ///
    /// Returns `Ok(None)` when the key does not match and `Err` when a
    /// captured value is not valid percent-encoded UTF-8.
    pub fn matches(&self, key: &str) -> Result<Option<PathMatch>, MatchError> {
        let (regex, keys) = match &self.compiled {
            Compiled::All => {
                let mut params = ParamVec::new();
                params.push((Arc::from("0"), key.to_string()));
                return Ok(Some(PathMatch {
                    params,
                    matched: key.to_string(),
                }));
            }
            Compiled::Regex { regex, keys } => (regex, keys),
        };

        let Some(caps) = regex.captures(key) else {
            return Ok(None);
        };

        let mut params = ParamVec::new();
        for (i, name) in keys.iter().enumerate() {
            // Absent optional groups never overwrite an earlier capture.
            let Some(m) = caps.get(i + 1) else {
                continue;
            };
            let value = decode_param(name, m.as_str())?;
            match params.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value,
                None => params.push((Arc::clone(name), value)),
            }
        }

        let whole = caps.get(0).map_or("", |m| m.as_str());
        let matched = whole.strip_suffix(self.delimiter).unwrap_or(whole);

        Ok(Some(PathMatch {
            params,
            matched: matched.to_string(),
        }))
    }

    /// Convert a route pattern into a regex and its ordered capture keys.
    ///
    /// `user.:id` with the default options becomes `^user\.([^\.]+?)$` with
    /// keys `["id"]`.
    pub(crate) fn pattern_to_regex(
        pattern: &str,
        opts: PatternOptions,
    ) -> Result<(Regex, Vec<Arc<str>>), RegistrationError> {
        let delim = regex::escape(&opts.delimiter.to_string());
        let invalid = |reason: String| RegistrationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut re = String::with_capacity(pattern.len() * 2 + 16);
        if !opts.case_sensitive {
            re.push_str("(?i)");
        }
        re.push('^');
        let mut keys: Vec<Arc<str>> = Vec::new();
        let mut positional = 0usize;

        for (i, segment) in pattern.split(opts.delimiter).enumerate() {
            let lead = if i == 0 { "" } else { delim.as_str() };

            if let Some(name) = segment.strip_prefix(':') {
                let (name, optional) = match name.strip_suffix('?') {
                    Some(n) => (n, true),
                    None => (name, false),
                };
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid(format!("bad parameter name in segment '{segment}'")));
                }
                if optional {
                    re.push_str(&format!("(?:{lead}([^{delim}]+?))?"));
                } else {
                    re.push_str(&format!("{lead}([^{delim}]+?)"));
                }
                keys.push(Arc::from(name));
            } else if segment.contains('*') {
                re.push_str(lead);
                let mut parts = segment.split('*').peekable();
                while let Some(part) = parts.next() {
                    re.push_str(&regex::escape(part));
                    if parts.peek().is_some() {
                        re.push_str("(.*)");
                        keys.push(Arc::from(positional.to_string()));
                        positional += 1;
                    }
                }
            } else {
                if segment.contains(|c| c == ':' || c == '?') {
                    return Err(invalid(format!("unexpected token in segment '{segment}'")));
                }
                re.push_str(lead);
                re.push_str(&regex::escape(segment));
            }
        }

        if !opts.strict && !pattern.ends_with(opts.delimiter) {
            re.push_str(&format!("(?:{delim})?"));
        }
        if opts.end {
            re.push('$');
        } else {
            re.push_str(&format!("(?:{delim}|$)"));
        }

        let regex = Regex::new(&re).map_err(|e| invalid(e.to_string()))?;
        Ok((regex, keys))
    }
}

fn decode_param(name: &str, raw: &str) -> Result<String, MatchError> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    let malformed = || MatchError {
        name: name.to_string(),
        value: raw.to_string(),
    };
    if !escapes_well_formed(raw) {
        return Err(malformed());
    }
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .map_err(|_| malformed())
}

/// Every `%` must introduce exactly two hex digits.
fn escapes_well_formed(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}
