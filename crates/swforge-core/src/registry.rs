//! Script registry
//!
//! Named script fragments with dependencies and audience scopes. The
//! registry owns registration-order bookkeeping and produces a stable
//! dependency ordering for assembly: a dependency always precedes the
//! handles that require it, and ties break by registration order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::warn;

use crate::error::SwResult;
use crate::scope::Scope;

/// Closure producing script text on demand.
pub type SourceFn = Box<dyn Fn() -> SwResult<String> + Send + Sync>;

/// Where a registered script's text comes from.
pub enum ScriptSource {
    /// A closure invoked at assembly time.
    Callable(SourceFn),
    /// A URL pointing at a file under the site's content directory.
    FileRef(String),
}

impl ScriptSource {
    /// Convenience constructor for callable sources.
    pub fn callable(f: impl Fn() -> SwResult<String> + Send + Sync + 'static) -> Self {
        ScriptSource::Callable(Box::new(f))
    }

    /// Convenience constructor for file sources.
    pub fn file(url: impl Into<String>) -> Self {
        ScriptSource::FileRef(url.into())
    }
}

impl std::fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptSource::Callable(_) => f.write_str("ScriptSource::Callable(..)"),
            ScriptSource::FileRef(url) => write!(f, "ScriptSource::FileRef({url:?})"),
        }
    }
}

/// A registered script fragment.
#[derive(Debug)]
pub struct RegisteredScript {
    /// Unique registration key.
    pub handle: String,

    /// Text source.
    pub source: ScriptSource,

    /// Handles that must appear before this one in the output.
    pub deps: Vec<String>,

    /// Audiences this fragment applies to.
    pub scope: Scope,
}

/// Registry of script fragments, keyed by handle.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    items: Vec<RegisteredScript>,
    index: HashMap<String, usize>,
}

impl ScriptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script fragment.
    ///
    /// Re-registering an existing handle overwrites it in place (the new
    /// metadata wins, the original registration slot is kept for
    /// ordering). Returns `false` only for an empty handle.
    pub fn register(
        &mut self,
        handle: impl Into<String>,
        source: ScriptSource,
        deps: Vec<String>,
        scope: Scope,
    ) -> bool {
        let handle = handle.into();
        if handle.is_empty() {
            warn!("refusing to register script with empty handle");
            return false;
        }

        let item = RegisteredScript {
            handle: handle.clone(),
            source,
            deps,
            scope,
        };

        match self.index.get(&handle) {
            Some(&pos) => {
                self.items[pos] = item;
            }
            None => {
                self.index.insert(handle, self.items.len());
                self.items.push(item);
            }
        }
        true
    }

    /// Look up a registered fragment.
    pub fn get(&self, handle: &str) -> Option<&RegisteredScript> {
        self.index.get(handle).map(|&pos| &self.items[pos])
    }

    /// Handles whose scope intersects the requested audience, in
    /// registration order.
    pub fn handles_for_scope(&self, scope: Scope) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.scope.intersects(scope))
            .map(|item| item.handle.clone())
            .collect()
    }

    /// Resolve a set of handles into dependency order.
    ///
    /// Topological sort over the dependency closure of the requested
    /// handles: every dependency is emitted before its dependents, each
    /// handle at most once, and whenever more than one handle is
    /// emittable the earliest-registered one goes first, so fragments
    /// with no dependency relation keep registration order regardless of
    /// how any dep list happens to be written. Dependencies outside the
    /// requested set are still pulled in if registered. Unknown
    /// dependencies are skipped with a warning; handles caught in a
    /// dependency cycle are appended in registration order rather than
    /// dropped.
    pub fn resolve(&self, requested: &[String]) -> Vec<String> {
        // Dependency closure, tracked by registration position.
        let mut included: BTreeSet<usize> = BTreeSet::new();
        let mut stack: Vec<usize> = requested
            .iter()
            .filter_map(|h| self.index.get(h.as_str()).copied())
            .collect();
        while let Some(pos) = stack.pop() {
            if !included.insert(pos) {
                continue;
            }
            for dep in &self.items[pos].deps {
                match self.index.get(dep) {
                    Some(&dep_pos) => stack.push(dep_pos),
                    None => {
                        warn!(
                            handle = self.items[pos].handle.as_str(),
                            dep = dep.as_str(),
                            "unknown dependency, skipping"
                        );
                    }
                }
            }
        }

        let mut indegree: HashMap<usize, usize> =
            included.iter().map(|&pos| (pos, 0)).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for &pos in &included {
            for dep in &self.items[pos].deps {
                if let Some(&dep_pos) = self.index.get(dep) {
                    *indegree.get_mut(&pos).unwrap() += 1;
                    dependents.entry(dep_pos).or_default().push(pos);
                }
            }
        }

        // Kahn's algorithm; the ready heap always yields the earliest
        // registered handle.
        let mut ready: BinaryHeap<Reverse<usize>> = included
            .iter()
            .filter(|&&pos| indegree[&pos] == 0)
            .map(|&pos| Reverse(pos))
            .collect();
        let mut ordered = Vec::with_capacity(included.len());
        while let Some(Reverse(pos)) = ready.pop() {
            ordered.push(self.items[pos].handle.clone());
            for &dependent in dependents.get(&pos).map(Vec::as_slice).unwrap_or_default() {
                let remaining = indegree.get_mut(&dependent).unwrap();
                *remaining -= 1;
                if *remaining == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        // Anything left has a cyclic dependency; serve it anyway, in
        // registration order.
        if ordered.len() < included.len() {
            for &pos in &included {
                if indegree[&pos] > 0 {
                    warn!(
                        handle = self.items[pos].handle.as_str(),
                        "dependency cycle detected, emitting in registration order"
                    );
                    ordered.push(self.items[pos].handle.clone());
                }
            }
        }
        ordered
    }
}
