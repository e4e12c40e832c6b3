//! Caching-rule compiler
//!
//! Turns declarative "cache this route with this strategy" registrations
//! into script statements against the runtime library's rule API. Rules
//! accumulate as text in registration order and are appended to every
//! served script, regardless of scope.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Caching strategy applied by the client-side runtime to matching
/// requests.
///
/// Only stale-while-revalidate is supported. Unknown strategy ids
/// downgrade to it silently; that downgrade is load-bearing for existing
/// callers and must not become an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachingStrategy {
    #[default]
    StaleWhileRevalidate,
}

impl CachingStrategy {
    /// Strategy id for stale-while-revalidate.
    pub const STALE_WHILE_REVALIDATE: u32 = 1;

    /// Map a strategy id to a strategy, downgrading unknown ids.
    pub fn from_id(id: u32) -> Self {
        match id {
            Self::STALE_WHILE_REVALIDATE => Self::StaleWhileRevalidate,
            other => {
                debug!(id = other, "unknown caching strategy, using staleWhileRevalidate");
                Self::StaleWhileRevalidate
            }
        }
    }

    /// Identifier used in the emitted script.
    pub fn script_name(self) -> &'static str {
        match self {
            Self::StaleWhileRevalidate => "staleWhileRevalidate",
        }
    }
}

/// Optional per-rule settings.
///
/// `max_age` is in seconds. Numeric options are emitted unquoted as
/// numeric literals in the generated script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    pub cache_name: Option<String>,
    pub max_age: Option<u64>,
    pub max_entries: Option<u64>,
}

/// Compile one caching rule into a script statement.
pub fn compile_rule(route: &str, strategy_id: u32, options: &RouteOptions) -> String {
    let strategy = CachingStrategy::from_id(strategy_id);

    let mut stmt = format!(
        "sw.cache.registerRoute( '{}', '{}'",
        escape_single_quoted(route),
        strategy.script_name()
    );
    if let Some(cache_name) = &options.cache_name {
        let _ = write!(stmt, ", '{}'", escape_single_quoted(cache_name));
    }
    for numeric in [options.max_age, options.max_entries].into_iter().flatten() {
        let _ = write!(stmt, ", {numeric}");
    }
    stmt.push_str(" );\n");
    stmt
}

/// Accumulated caching-rule text, in registration order.
#[derive(Debug, Default)]
pub struct CachingRules {
    compiled: String,
}

impl CachingRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a rule. An empty route is developer misuse and
    /// is skipped with a warning.
    pub fn register(&mut self, route: &str, strategy_id: u32, options: &RouteOptions) {
        if route.trim().is_empty() {
            warn!("ignoring caching rule with empty route");
            return;
        }
        self.compiled.push_str(&compile_rule(route, strategy_id, options));
    }

    /// The compiled rule statements.
    pub fn as_script(&self) -> &str {
        &self.compiled
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Escape a string for embedding in a single-quoted script literal.
fn escape_single_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
